// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Border masking: paints the dark scanner border around the page with a
// uniform background value. Output dimensions never change.

use std::collections::VecDeque;

use image::{GrayImage, Luma};
use scanprep_core::config::EdgeMaskConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::components::Components;
use crate::page::PageImage;

#[derive(Debug, Clone)]
pub struct EdgeMask {
    cfg: EdgeMaskConfig,
}

/// What the border analysis found on a page.
struct BorderAnalysis {
    /// 255 on every pixel outside the page contour.
    outside: GrayImage,
    outside_pixels: u64,
    content_ratio: f64,
    edge_dark_fraction: f64,
    dominance: f64,
    content_fraction: f64,
}

enum Analysis {
    NoContent,
    NoDominantContour { dominance: f64, content_fraction: f64 },
    Border(BorderAnalysis),
}

impl EdgeMask {
    pub fn new(cfg: EdgeMaskConfig) -> Self {
        Self { cfg }
    }

    fn analyse(&self, gray: &GrayImage) -> Analysis {
        let (w, h) = gray.dimensions();
        let n = w as u64 * h as u64;
        let mut bright = gray.clone();
        for p in bright.iter_mut() {
            *p = if *p > self.cfg.dark_level { 255 } else { 0 };
        }

        let comps = Components::label(&bright);
        let (Some(largest), second) = comps.two_largest() else {
            return Analysis::NoContent;
        };
        let dominance = second.map_or(f64::INFINITY, |s| largest.area as f64 / s.area as f64);
        let content_fraction = largest.area as f64 / n as f64;
        if dominance < self.cfg.min_dominance as f64
            || content_fraction < self.cfg.min_content_fraction as f64
        {
            return Analysis::NoDominantContour {
                dominance,
                content_fraction,
            };
        }

        // Everything reachable from the frame edge without crossing the page.
        let (wu, hu) = (w as usize, h as usize);
        let mut outside = vec![false; wu * hu];
        let mut queue = VecDeque::new();
        let on_page = |i: usize| comps.label_at((i % wu) as u32, (i / wu) as u32) == largest.label;
        let seed = |i: usize, outside: &mut Vec<bool>, queue: &mut VecDeque<usize>| {
            if !outside[i] && !on_page(i) {
                outside[i] = true;
                queue.push_back(i);
            }
        };
        for x in 0..wu {
            seed(x, &mut outside, &mut queue);
            seed((hu - 1) * wu + x, &mut outside, &mut queue);
        }
        for y in 0..hu {
            seed(y * wu, &mut outside, &mut queue);
            seed(y * wu + wu - 1, &mut outside, &mut queue);
        }
        while let Some(i) = queue.pop_front() {
            let (x, y) = (i % wu, i / wu);
            if x > 0 {
                seed(i - 1, &mut outside, &mut queue);
            }
            if x + 1 < wu {
                seed(i + 1, &mut outside, &mut queue);
            }
            if y > 0 {
                seed(i - wu, &mut outside, &mut queue);
            }
            if y + 1 < hu {
                seed(i + wu, &mut outside, &mut queue);
            }
        }

        let outside_pixels = outside.iter().filter(|&&o| o).count() as u64;

        // Outer strips catch borders too thin to move the area ratio.
        let band = (w.min(h) / 70).max(5);
        let strip = (band / 2).max(1).min(w.min(h) / 2).max(1) as usize;
        let mut strip_total = 0u64;
        let mut strip_dark = 0u64;
        for y in 0..hu {
            for x in 0..wu {
                if x < strip || y < strip || x >= wu - strip || y >= hu - strip {
                    strip_total += 1;
                    if outside[y * wu + x] {
                        strip_dark += 1;
                    }
                }
            }
        }

        let mask = GrayImage::from_fn(w, h, |x, y| {
            Luma([if outside[y as usize * wu + x as usize] { 255 } else { 0 }])
        });

        Analysis::Border(BorderAnalysis {
            outside: mask,
            outside_pixels,
            content_ratio: 1.0 - outside_pixels as f64 / n as f64,
            edge_dark_fraction: strip_dark as f64 / strip_total.max(1) as f64,
            dominance,
            content_fraction,
        })
    }
}

impl ProcessingUnit for EdgeMask {
    fn kind(&self) -> UnitKind {
        UnitKind::EdgeMask
    }

    fn detect(&self, image: &PageImage, _ctx: &UnitContext<'_>) -> DetectionResult {
        match self.analyse(&image.luma()) {
            Analysis::NoContent => DetectionResult::skip("no_content", metadata!()),
            Analysis::NoDominantContour {
                dominance,
                content_fraction,
            } => DetectionResult::skip(
                "no_dominant_contour",
                metadata! {
                    "dominance" => dominance.min(1e9),
                    "content_fraction" => content_fraction,
                },
            ),
            Analysis::Border(a) => {
                let meta = metadata! {
                    "content_ratio" => a.content_ratio,
                    "border_threshold" => self.cfg.border_threshold,
                    "edge_dark_fraction" => a.edge_dark_fraction,
                    "border_pixels" => a.outside_pixels as i64,
                    "dominance" => a.dominance.min(1e9),
                    "content_fraction" => a.content_fraction,
                };
                let thin_border = a.edge_dark_fraction > self.cfg.thin_border_dark_fraction as f64;
                if a.outside_pixels > 0
                    && (a.content_ratio < self.cfg.border_threshold as f64 || thin_border)
                {
                    DetectionResult::run(meta)
                } else {
                    DetectionResult::skip("below_threshold", meta)
                }
            }
        }
    }

    fn process(
        &self,
        image: &PageImage,
        _detection: &DetectionResult,
        _ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let Analysis::Border(a) = self.analyse(&image.luma()) else {
            return ProcessResult::degraded(image, "border_not_found", metadata!());
        };
        let painted = image.paint(&a.outside, self.cfg.fill);
        debug!(painted = a.outside_pixels, "Border masked");
        ProcessResult::applied(
            painted,
            metadata! {
                "painted_pixels" => a.outside_pixels as i64,
                "fill" => self.cfg.fill as i64,
            },
        )
    }
}
