use super::test_helpers::*;
use super::DownloadManager;
use crate::error::{DownloadError, Error};
use crate::types::{DownloadRequest, Event, Quality, Status, TaskId, UserId};

mod control;
