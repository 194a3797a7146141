use scraper::{Html, Selector};

use super::{ChildDescriptor, OBJECT_MARKER};
use crate::{GatewayFsError, Result};

/// Turns a gateway listing response body into child entries.
///
/// The HTML scraper is the only decoder today; a JSON directory API would
/// plug in here without touching the node code.
pub trait ListingDecoder: Send + Sync {
    fn decode(&self, body: &[u8]) -> Result<Vec<ChildDescriptor>>;
}

/// Decodes the hypertext index pages served for directory objects.
///
/// Every anchor is considered in document order. Anchors that do not point
/// at `/ipfs/<cid>/.../<name>` are skipped. Duplicates are kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlListingDecoder;

impl ListingDecoder for HtmlListingDecoder {
    fn decode(&self, body: &[u8]) -> Result<Vec<ChildDescriptor>> {
        let text = String::from_utf8_lossy(body);
        let document = Html::parse_document(&text);
        let anchors = Selector::parse("a")
            .map_err(|e| GatewayFsError::NotFound(format!("anchor selector: {e}")))?;

        Ok(document
            .select(&anchors)
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter_map(parse_href)
            .collect())
    }
}

/// Classify a single hyperlink target, or `None` if it is not a child entry.
pub fn parse_href(raw: &str) -> Option<ChildDescriptor> {
    let href = raw.split('?').next().unwrap_or_default();
    if href.is_empty() || href == "../" {
        return None;
    }

    let parts: Vec<&str> = href.trim_matches('/').split('/').collect();
    if parts.len() < 2 || parts[0] != OBJECT_MARKER {
        return None;
    }

    let name = parts[parts.len() - 1];
    if name.is_empty() || name == ".." {
        return None;
    }

    Some(ChildDescriptor {
        name: name.to_string(),
        cid: parts[1].to_string(),
        is_dir: href.ends_with('/'),
        href: href.to_string(),
    })
}
