use crate::config::settings::FormatConfig;
use crate::media::asset::{MediaAsset, MediaPair};
use crate::media::catalog::ScanResult;

/// Resolve one pair per audio stem, in the scan's audio order.
///
/// Video candidates win over images. Among videos the smallest file name is taken; among
/// images the configured preference order decides first, then the file name. Stems without
/// any visual produce no pair.
pub fn resolve_pairs(scan: &ScanResult, formats: &FormatConfig) -> Vec<MediaPair> {
    scan.audio
        .iter()
        .filter_map(|audio| {
            let visual = select_visual(scan, formats, &audio.stem)?;
            MediaPair::new(audio.clone(), visual.clone()).ok()
        })
        .collect()
}

/// Stems that have audio but no video or image candidate.
pub fn unpaired_stems(scan: &ScanResult) -> Vec<String> {
    scan.audio
        .iter()
        .filter(|a| scan.videos_for(&a.stem).is_empty() && scan.images_for(&a.stem).is_empty())
        .map(|a| a.stem.clone())
        .collect()
}

fn select_visual<'a>(
    scan: &'a ScanResult,
    formats: &FormatConfig,
    stem: &str,
) -> Option<&'a MediaAsset> {
    if let Some(video) = scan.videos_for(stem).iter().min_by_key(|v| v.file_name()) {
        return Some(video);
    }
    scan.images_for(stem)
        .iter()
        .min_by_key(|img| (formats.image_rank(&img.extension()), img.file_name()))
}

#[cfg(test)]
#[path = "../../tests/unit/media/pairing.rs"]
mod tests;
