/// Name of the Google Cloud SDK executable on this OS.
pub fn gcloud_program() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "gcloud.cmd"
    }

    #[cfg(not(target_os = "windows"))]
    {
        "gcloud"
    }
}

pub fn os_label() -> &'static str {
    std::env::consts::OS
}
