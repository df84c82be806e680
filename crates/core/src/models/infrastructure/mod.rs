pub mod bzip2_extractor;
pub mod http_downloader;
