//! Provider-agnostic normalization helpers
//!
//! Quality ranking, cover URL expansion and discography de-duplication are shared by
//! every provider variant so that they all converge on the same canonical records.

use std::collections::HashMap;

use crate::types::Quality;

/// CDN serving cover art and artist pictures
pub const IMAGE_CDN: &str = "https://resources.tidal.com/images";

impl Quality {
    /// Rank a capability-tag set, starting from High when no tag matches
    ///
    /// ```
    /// use music_dl::Quality;
    ///
    /// let tags = ["LOSSLESS".to_string(), "HIRES_LOSSLESS".to_string()];
    /// assert_eq!(Quality::from_tags(&tags), Quality::HiresLossless);
    /// assert_eq!(Quality::from_tags::<&str>(&[]), Quality::High);
    /// ```
    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Quality {
        rank_tags(Quality::High, tags)
    }
}

/// Resolve a record's quality from its declared tier and capability tags
///
/// The declared `audioQuality` value acts as a floor; tags only ever raise it.
/// Without a declared value the tag set is ranked from High, and a record carrying
/// no quality signal at all is Low.
pub fn resolve_quality<S: AsRef<str>>(declared: Option<&str>, tags: &[S]) -> Quality {
    let declared = declared
        .filter(|d| !d.is_empty())
        .and_then(|d| d.parse::<Quality>().ok());
    match declared {
        Some(floor) => rank_tags(floor, tags),
        None if tags.is_empty() => Quality::Low,
        None => Quality::from_tags(tags),
    }
}

fn rank_tags<S: AsRef<str>>(start: Quality, tags: &[S]) -> Quality {
    tags.iter().fold(start, |best, tag| match tag.as_ref() {
        "HIRES_LOSSLESS" => best.max(Quality::HiresLossless),
        "LOSSLESS" | "DOLBY_ATMOS" => best.max(Quality::Lossless),
        _ => best,
    })
}

/// Expand an encrypted image path fragment into a square CDN URL
///
/// `ab-cd-ef` becomes `https://resources.tidal.com/images/ab/cd/ef/640x640.jpg`.
/// An empty fragment yields an empty URL.
pub fn image_url(fragment: &str, size: u32) -> String {
    if fragment.is_empty() {
        return String::new();
    }
    format!(
        "{}/{}/{}x{}.jpg",
        IMAGE_CDN,
        fragment.replace('-', "/"),
        size,
        size
    )
}

/// Truncate an ISO-8601 timestamp to its `YYYY-MM-DD` date part
pub fn release_date(raw: &str) -> String {
    raw.get(..10).unwrap_or(raw).to_string()
}

/// A discography entry that can be de-duplicated
pub trait Release {
    /// Release title
    fn title(&self) -> &str;
    /// Release date as an ISO string (sorts lexicographically)
    fn release_date(&self) -> &str;
    /// Whether this is the explicit version
    fn explicit(&self) -> bool;
    /// Number of capability tags (richer means better)
    fn tag_count(&self) -> usize;
}

/// Keep one entry per `(title, release date)`, newest first
///
/// The explicit version wins over the clean one; between equally explicit
/// versions the one with more capability tags wins. Remaining ties keep the
/// entry seen first.
pub fn dedupe_releases<T: Release>(entries: Vec<T>) -> Vec<T> {
    let mut best: Vec<T> = Vec::with_capacity(entries.len());
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for entry in entries {
        let key = (entry.title().to_string(), entry.release_date().to_string());
        match index.get(&key) {
            Some(&slot) => {
                if outranks(&entry, &best[slot]) {
                    best[slot] = entry;
                }
            }
            None => {
                index.insert(key, best.len());
                best.push(entry);
            }
        }
    }

    // Stable sort keeps first-seen order among same-day releases
    best.sort_by(|a, b| b.release_date().cmp(a.release_date()));
    best
}

fn outranks<T: Release>(candidate: &T, current: &T) -> bool {
    (candidate.explicit() && !current.explicit())
        || (candidate.explicit() == current.explicit()
            && candidate.tag_count() > current.tag_count())
}
