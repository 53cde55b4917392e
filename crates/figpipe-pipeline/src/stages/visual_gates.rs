use std::path::Path;

use figpipe_types::{GateResult, GateStatus, VisualMode};

pub const VISUAL_GATE: &str = "visual";

/// Byte positions compared by the fallback similarity, at most.
const SAMPLE_BUDGET: usize = 200_000;

/// Compare a reference screenshot against an implementation screenshot.
pub fn run_visual_gates(
    figma_screenshot: Option<&Path>,
    implementation_screenshot: Option<&Path>,
    pass_threshold: f64,
    warn_threshold: f64,
    visual_mode: VisualMode,
) -> GateResult {
    let mut evidence_paths: Vec<String> = [figma_screenshot, implementation_screenshot]
        .into_iter()
        .flatten()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    let gate = |status, score, evidence_paths, issues| GateResult {
        gate_name: VISUAL_GATE.to_string(),
        status,
        score,
        threshold: pass_threshold,
        evidence_paths,
        issues,
    };

    let Some(figma_path) = figma_screenshot else {
        return gate(
            GateStatus::Skipped,
            0.0,
            evidence_paths,
            vec!["Figma reference screenshot unavailable.".to_string()],
        );
    };
    let Some(impl_path) = implementation_screenshot else {
        return gate(
            GateStatus::Warn,
            warn_threshold,
            evidence_paths,
            vec!["Implementation screenshot not provided; visual comparison skipped.".to_string()],
        );
    };

    let missing: Vec<String> = [figma_path, impl_path]
        .into_iter()
        .filter(|p| !p.exists())
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    if !missing.is_empty() {
        return gate(
            GateStatus::Fail,
            0.0,
            evidence_paths,
            vec![format!("Missing screenshot files: {}", missing.join(", "))],
        );
    }

    let score = similarity(figma_path, impl_path);
    let status = GateStatus::from_score(score, pass_threshold, warn_threshold);
    tracing::info!(score, status = %status, "Visual comparison finished");

    let mut issues = Vec::new();
    if status != GateStatus::Pass && visual_mode == VisualMode::Hybrid {
        let explanation = explain(figma_path, impl_path);
        issues.extend(explanation.issues);
        evidence_paths.extend(explanation.evidence_paths);
    }

    gate(status, score, evidence_paths, issues)
}

/// Similarity in `[0, 100]`, rounded to two decimals.
pub fn similarity(reference: &Path, implementation: &Path) -> f64 {
    pixel_similarity(reference, implementation)
        .unwrap_or_else(|| byte_similarity(reference, implementation))
}

#[cfg(feature = "pixel-diff")]
fn pixel_similarity(reference: &Path, implementation: &Path) -> Option<f64> {
    match pixel::similarity(reference, implementation) {
        Ok(score) => Some(score),
        Err(e) => {
            tracing::debug!(error = %e, "Pixel diff unavailable, using byte sampling");
            None
        }
    }
}

#[cfg(not(feature = "pixel-diff"))]
fn pixel_similarity(_reference: &Path, _implementation: &Path) -> Option<f64> {
    None
}

/// Sampled byte equality scaled by the shorter-to-longer length ratio.
pub fn byte_similarity(a: &Path, b: &Path) -> f64 {
    let a = std::fs::read(a).unwrap_or_default();
    let b = std::fs::read(b).unwrap_or_default();
    byte_similarity_of(&a, &b)
}

fn byte_similarity_of(a: &[u8], b: &[u8]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let min_len = a.len().min(b.len());
    let max_len = a.len().max(b.len());
    let step = (min_len / SAMPLE_BUDGET).max(1);

    let (mut matches, mut samples) = (0usize, 0usize);
    for idx in (0..min_len).step_by(step) {
        samples += 1;
        if a[idx] == b[idx] {
            matches += 1;
        }
    }

    let sample_ratio = matches as f64 / samples as f64;
    let length_ratio = min_len as f64 / max_len as f64;
    round2(sample_ratio * length_ratio * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

struct Explanation {
    issues: Vec<String>,
    evidence_paths: Vec<String>,
}

#[cfg(not(feature = "pixel-diff"))]
fn explain(_reference: &Path, _implementation: &Path) -> Explanation {
    Explanation {
        issues: vec!["Vision explanation unavailable: pixel diff support is not compiled in.".into()],
        evidence_paths: Vec::new(),
    }
}

#[cfg(feature = "pixel-diff")]
fn explain(reference: &Path, implementation: &Path) -> Explanation {
    match pixel::explain(reference, implementation) {
        Ok(explanation) => explanation,
        Err(e) => Explanation {
            issues: vec![format!("Vision explanation failed: {e}")],
            evidence_paths: Vec::new(),
        },
    }
}

#[cfg(feature = "pixel-diff")]
mod pixel {
    use std::collections::VecDeque;
    use std::path::Path;

    use image::imageops::{self, FilterType};
    use image::{GrayImage, ImageResult, Luma, RgbImage};

    use super::{round2, Explanation};

    /// Decode to RGB. Alpha is dropped, so pixels differing only in alpha compare equal.
    fn load_pair(reference: &Path, implementation: &Path) -> ImageResult<(RgbImage, RgbImage)> {
        let a = image::open(reference)?.to_rgb8();
        let mut b = image::open(implementation)?.to_rgb8();
        if a.dimensions() != b.dimensions() {
            let (w, h) = a.dimensions();
            b = imageops::resize(&b, w, h, FilterType::Lanczos3);
        }
        Ok((a, b))
    }

    pub(super) fn similarity(reference: &Path, implementation: &Path) -> ImageResult<f64> {
        let (a, b) = load_pair(reference, implementation)?;
        let channels = a.as_raw().len();
        if channels == 0 {
            return Ok(100.0);
        }
        let total: u64 = a
            .as_raw()
            .iter()
            .zip(b.as_raw())
            .map(|(x, y)| u64::from(x.abs_diff(*y)))
            .sum();
        let mean_delta = total as f64 / channels as f64;
        Ok(round2((100.0 - mean_delta / 255.0 * 100.0).max(0.0)))
    }

    /// Grayscale (ITU-R 601 luma) of the per-channel absolute difference.
    fn diff_map(a: &RgbImage, b: &RgbImage) -> GrayImage {
        let (w, h) = a.dimensions();
        GrayImage::from_fn(w, h, |x, y| {
            let p = a.get_pixel(x, y).0;
            let q = b.get_pixel(x, y).0;
            let d = |i: usize| u32::from(p[i].abs_diff(q[i]));
            let luma = (d(0) * 299 + d(1) * 587 + d(2) * 114 + 500) / 1000;
            Luma([luma.min(255) as u8])
        })
    }

    /// Bounding box `(x0, y0, x1, y1)`, end-exclusive, of the largest
    /// 4-connected region of changed pixels.
    fn largest_region(gray: &GrayImage) -> Option<(u32, u32, u32, u32)> {
        let (w, h) = gray.dimensions();
        let (wu, hu) = (w as usize, h as usize);
        let mut seen = vec![false; wu * hu];
        let mut best: Option<(usize, (u32, u32, u32, u32))> = None;
        let mut queue = VecDeque::new();

        for start in 0..wu * hu {
            if seen[start] || gray.as_raw()[start] == 0 {
                continue;
            }
            seen[start] = true;
            queue.push_back(start);
            let mut size = 0usize;
            let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0u32, 0u32);

            while let Some(idx) = queue.pop_front() {
                size += 1;
                let (x, y) = ((idx % wu) as u32, (idx / wu) as u32);
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x + 1);
                y1 = y1.max(y + 1);

                let mut neighbours = Vec::with_capacity(4);
                if x > 0 {
                    neighbours.push(idx - 1);
                }
                if x + 1 < w {
                    neighbours.push(idx + 1);
                }
                if y > 0 {
                    neighbours.push(idx - wu);
                }
                if y + 1 < h {
                    neighbours.push(idx + wu);
                }
                for n in neighbours {
                    if !seen[n] && gray.as_raw()[n] != 0 {
                        seen[n] = true;
                        queue.push_back(n);
                    }
                }
            }

            if best.map_or(true, |(best_size, _)| size > best_size) {
                best = Some((size, (x0, y0, x1, y1)));
            }
        }

        best.map(|(_, bbox)| bbox)
    }

    /// Stretch the darkest..brightest range to 0..255.
    fn autocontrast(gray: &GrayImage) -> GrayImage {
        let min = gray.as_raw().iter().copied().min().unwrap_or(0);
        let max = gray.as_raw().iter().copied().max().unwrap_or(0);
        if max <= min {
            return gray.clone();
        }
        let span = f32::from(max - min);
        let mut out = gray.clone();
        for pixel in out.pixels_mut() {
            let v = f32::from(pixel.0[0] - min) * 255.0 / span;
            pixel.0[0] = v.round().clamp(0.0, 255.0) as u8;
        }
        out
    }

    pub(super) fn explain(reference: &Path, implementation: &Path) -> ImageResult<Explanation> {
        let (a, b) = load_pair(reference, implementation)?;
        let gray = diff_map(&a, &b);
        let total = (gray.width() as usize * gray.height() as usize).max(1);
        let changed = gray.as_raw().iter().filter(|v| **v != 0).count();
        let changed_ratio = changed as f64 / total as f64 * 100.0;

        let category = if changed_ratio >= 35.0 {
            "High structural mismatch"
        } else if changed_ratio >= 10.0 {
            "Layout/spacing mismatch"
        } else {
            "Color/tone mismatch"
        };

        let mut issues = vec![format!(
            "Vision summary: {category} (changed_pixels={changed_ratio:.2}%)."
        )];
        if let Some((x0, y0, x1, y1)) = largest_region(&gray) {
            issues.push(format!("Primary diff region: x={x0}-{x1}, y={y0}-{y1}."));
        }

        let mut evidence_paths = Vec::new();
        let stem = implementation
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "implementation".to_string());
        let diff_path = implementation.with_file_name(format!("{stem}.diff.png"));
        match autocontrast(&gray).save(&diff_path) {
            Ok(()) => evidence_paths.push(diff_path.to_string_lossy().into_owned()),
            Err(e) => tracing::warn!(error = %e, "Could not write diff map"),
        }

        Ok(Explanation {
            issues,
            evidence_paths,
        })
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn largest_region_picks_biggest_component() {
            let mut gray = GrayImage::new(10, 4);
            gray.put_pixel(0, 0, Luma([9]));
            for x in 4..8 {
                for y in 1..3 {
                    gray.put_pixel(x, y, Luma([200]));
                }
            }
            assert_eq!(largest_region(&gray), Some((4, 1, 8, 3)));
            assert_eq!(largest_region(&GrayImage::new(3, 3)), None);
        }

        #[test]
        fn autocontrast_stretches_range() {
            let mut gray = GrayImage::new(2, 1);
            gray.put_pixel(0, 0, Luma([10]));
            gray.put_pixel(1, 0, Luma([20]));
            let out = autocontrast(&gray);
            assert_eq!(out.get_pixel(0, 0).0[0], 0);
            assert_eq!(out.get_pixel(1, 0).0[0], 255);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_reference_is_skipped() {
        let gate = run_visual_gates(None, None, 95.0, 85.0, VisualMode::Hybrid);
        assert_eq!(gate.status, GateStatus::Skipped);
        assert_eq!(gate.score, 0.0);
        assert_eq!(gate.issues.len(), 1);
    }

    #[test]
    fn no_implementation_warns_at_threshold() {
        let gate = run_visual_gates(Some(Path::new("ref.png")), None, 95.0, 85.0, VisualMode::Pixel);
        assert_eq!(gate.status, GateStatus::Warn);
        assert_eq!(gate.score, 85.0);
        assert_eq!(gate.evidence_paths, vec!["ref.png"]);
    }

    #[test]
    fn missing_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.png");
        std::fs::write(&present, b"x").unwrap();
        let absent = dir.path().join("b.png");
        let gate = run_visual_gates(Some(&present), Some(&absent), 95.0, 85.0, VisualMode::Hybrid);
        assert_eq!(gate.status, GateStatus::Fail);
        assert!(gate.issues[0].contains("b.png"));
        assert!(!gate.issues[0].contains("a.png"));
    }

    #[test]
    fn identical_bytes_pass() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, b"not an image but identical").unwrap();
        std::fs::write(&b, b"not an image but identical").unwrap();
        let gate = run_visual_gates(Some(&a), Some(&b), 95.0, 85.0, VisualMode::Hybrid);
        assert_eq!(gate.status, GateStatus::Pass);
        assert!(gate.score >= 99.0);
    }

    #[test]
    fn byte_fallback_penalizes_length_mismatch() {
        assert_eq!(byte_similarity_of(b"", b""), 100.0);
        assert_eq!(byte_similarity_of(b"abc", b""), 0.0);
        assert_eq!(byte_similarity_of(b"abcd", b"abcdabcd"), 50.0);
        assert_eq!(byte_similarity_of(b"abcd", b"abzz"), 50.0);
    }

    #[cfg(feature = "pixel-diff")]
    mod pixels {
        use super::*;
        use image::{Rgba, RgbaImage};

        fn write(path: &Path, img: RgbaImage) {
            img.save(path).unwrap();
        }

        #[test]
        fn alpha_only_difference_is_identical() {
            let dir = tempfile::tempdir().unwrap();
            let a = dir.path().join("a.png");
            let b = dir.path().join("b.png");
            write(&a, RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 0])));
            write(&b, RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255])));
            assert_eq!(similarity(&a, &b), 100.0);
        }

        #[test]
        fn half_changed_fails_with_hybrid_explanation() {
            let dir = tempfile::tempdir().unwrap();
            let a = dir.path().join("figma.png");
            let b = dir.path().join("implementation.png");
            write(&a, RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255])));
            let mut img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
            for x in 0..5 {
                for y in 0..10 {
                    img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
                }
            }
            write(&b, img);

            let gate = run_visual_gates(Some(&a), Some(&b), 95.0, 85.0, VisualMode::Hybrid);
            assert_eq!(gate.status, GateStatus::Fail);
            assert_eq!(gate.score, 50.0);
            assert!(gate.issues[0].starts_with("Vision summary: High structural mismatch"));
            assert_eq!(gate.issues[1], "Primary diff region: x=0-5, y=0-10.");
            assert!(dir.path().join("implementation.diff.png").exists());
            assert_eq!(gate.evidence_paths.len(), 3);

            let pixel_only = run_visual_gates(Some(&a), Some(&b), 95.0, 85.0, VisualMode::Pixel);
            assert!(pixel_only.issues.is_empty());
            assert_eq!(pixel_only.evidence_paths.len(), 2);
        }

        #[test]
        fn mismatched_sizes_are_resized() {
            let dir = tempfile::tempdir().unwrap();
            let a = dir.path().join("a.png");
            let b = dir.path().join("b.png");
            write(&a, RgbaImage::from_pixel(8, 8, Rgba([40, 40, 40, 255])));
            write(&b, RgbaImage::from_pixel(4, 4, Rgba([40, 40, 40, 255])));
            assert!(similarity(&a, &b) >= 99.0);
        }
    }
}
