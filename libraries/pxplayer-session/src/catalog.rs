//! Media catalog
//!
//! In-memory library keyed by media id. The session resolves prepared
//! media through it and browsing clients list its contents under one of
//! two roots chosen by client identity.

use crate::error::Result;
use crate::types::{DownloadStatus, MediaDescriptor};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

/// Root handed to the trusted client
pub const MEDIA_ROOT_ID: &str = "px_player";

/// Root handed to every other client
pub const MEDIA_ROOT_ID_EMPTY: &str = "px_player_empty";

/// Pick the browse root for a connecting client
pub fn root_for(client_name: &str, trusted_client: &str) -> &'static str {
    if client_name == trusted_client {
        MEDIA_ROOT_ID
    } else {
        MEDIA_ROOT_ID_EMPTY
    }
}

/// Browse flags of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaFlags {
    pub browsable: bool,
    pub playable: bool,
}

/// Catalog entry as listed to browsing clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub description: MediaDescriptor,
    pub flags: MediaFlags,
}

impl MediaItem {
    fn playable(description: MediaDescriptor) -> Self {
        Self {
            description,
            flags: MediaFlags {
                browsable: false,
                playable: true,
            },
        }
    }
}

/// Key to metadata lookup used by the session
pub trait MediaCatalog: Send + Sync {
    /// Descriptor for `id`, if known
    fn metadata(&self, id: &str) -> Option<MediaDescriptor>;

    /// Insert or replace a descriptor
    fn add_media(&self, media: MediaDescriptor);

    /// Entries listed under `parent_id`
    fn children(&self, parent_id: &str) -> Vec<MediaItem>;

    /// Playable entry for `id`, if known
    fn item(&self, id: &str) -> Option<MediaItem> {
        self.metadata(id).map(MediaItem::playable)
    }
}

/// Blocking duration lookup for media submitted without one
///
/// Runs on the blocking worker pool, never on the session context.
/// `Ok(None)` means the source has no usable duration.
pub trait DurationProbe: Send + Sync {
    fn probe_duration(&self, media_uri: &str) -> Result<Option<Duration>>;
}

impl<F> DurationProbe for F
where
    F: Fn(&str) -> Result<Option<Duration>> + Send + Sync,
{
    fn probe_duration(&self, media_uri: &str) -> Result<Option<Duration>> {
        self(media_uri)
    }
}

/// In-memory ordered media library
#[derive(Debug, Default)]
pub struct MediaLibrary {
    entries: RwLock<BTreeMap<String, MediaDescriptor>>,
}

impl MediaLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every descriptor of a playlist
    pub fn add_playlist(&self, playlist: impl IntoIterator<Item = MediaDescriptor>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for media in playlist {
            entries.insert(media.id.clone(), media);
        }
    }

    /// Remove a descriptor, returning it if it was present
    pub fn remove_media(&self, id: &str) -> Option<MediaDescriptor> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Update the download flag; returns `false` for unknown ids
    pub fn set_download_status(&self, id: &str, status: DownloadStatus) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(id) {
            Some(media) => {
                media.download_status = status;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaCatalog for MediaLibrary {
    fn metadata(&self, id: &str) -> Option<MediaDescriptor> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn add_media(&self, media: MediaDescriptor) {
        debug!(media_id = %media.id, "Adding media to library");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(media.id.clone(), media);
    }

    fn children(&self, parent_id: &str) -> Vec<MediaItem> {
        if parent_id != MEDIA_ROOT_ID && parent_id != MEDIA_ROOT_ID_EMPTY {
            return Vec::new();
        }
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .map(MediaItem::playable)
            .collect()
    }
}
