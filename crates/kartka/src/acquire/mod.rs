//! Acquisition: downloading scan sequences and sorting them into pairs.
//!
//! Scans arrive from the archive as numbered files with no page roles. The
//! downloader fetches a range of them; the classifier labels each as a
//! front page, a list page or something else; the pairing functions turn
//! the labels (or plain name order) into front/list pairs for the batch
//! runner.

mod classify;
mod download;
mod pairing;

pub use classify::{
    composite, ClassificationRecord, DirectoryClassification, PageClassifier, PageType,
    PageTypeReply, TypeCounts, CLASSIFICATION_FILE, HEADER_REGION, MAX_SIDE, SIDEBAR_REGION,
};
pub use download::{
    target_name, DownloadFailure, DownloadJob, DownloadReport, FetchResponse, FetchStatus,
    HttpTransport, ResumableDownloader, Transport, INDEX_PLACEHOLDER, PART_SUFFIX,
};
pub use pairing::{
    discover_images, is_image, pair_nearest_following, pair_sorted, Pair, PairingMode,
    IMAGE_EXTENSIONS,
};
