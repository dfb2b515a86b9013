// THEORY:
// An `ActiveZone` is a fixed rectangular region of interest, given in
// normalized image coordinates, that reports a single bit: is there motion
// inside it right now? The `ZoneMonitor` owns the list of zones and, once per
// frame, measures how much of each zone is lit in the threshold image.
//
// Key principles:
// 1.  **Fill ratio, no hysteresis**: a zone is occupied exactly when its fill
//     ratio is above its threshold. The ratio uses the historical
//     `floor(w * W) + floor(h * H)` denominator (a sum, not a product); the
//     default threshold of 0.02 is calibrated against it, so it is kept as is.
// 2.  **Events, not live references**: on every flip the zone's handler gets
//     a `ZoneEvent` snapshot, and the same snapshot is returned to the caller.
//     Nothing outlives the frame that produced it.
// 3.  **Caller-owned identity**: ids are whatever the caller wants (numbers or
//     names). Duplicates are allowed and only produce a warning.

use crate::config::clamp_unit;
use crate::core_modules::geometry::NormRect;
use crate::core_modules::image_filter::UNLIT;
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::events::{FrameStamp, ZoneEvent, ZoneEventHandler};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Identifier of an active zone: an integer or a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZoneId {
    Int(i64),
    Name(String),
}

impl From<i64> for ZoneId {
    fn from(v: i64) -> Self {
        ZoneId::Int(v)
    }
}

impl From<i32> for ZoneId {
    fn from(v: i32) -> Self {
        ZoneId::Int(v as i64)
    }
}

impl From<usize> for ZoneId {
    fn from(v: usize) -> Self {
        ZoneId::Int(v as i64)
    }
}

impl From<&str> for ZoneId {
    fn from(v: &str) -> Self {
        ZoneId::Name(v.to_string())
    }
}

impl From<String> for ZoneId {
    fn from(v: String) -> Self {
        ZoneId::Name(v)
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneId::Int(v) => write!(f, "{v}"),
            ZoneId::Name(v) => f.write_str(v),
        }
    }
}

/// A monitored rectangular region.
pub struct ActiveZone {
    /// Caller-chosen identifier. Not necessarily unique.
    pub id: ZoneId,
    pub rect: NormRect,
    enabled: bool,
    occupied: bool,
    changed: bool,
    /// Fill ratio above which the zone counts as occupied.
    pub fill_threshold: f64,
    fill_ratio: f64,
    changed_at: Option<FrameStamp>,
    handler: Option<Box<dyn ZoneEventHandler>>,
}

impl fmt::Debug for ActiveZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveZone")
            .field("id", &self.id)
            .field("rect", &self.rect)
            .field("enabled", &self.enabled)
            .field("occupied", &self.occupied)
            .field("changed", &self.changed)
            .field("fill_threshold", &self.fill_threshold)
            .field("fill_ratio", &self.fill_ratio)
            .field("changed_at", &self.changed_at)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl ActiveZone {
    fn new(
        id: ZoneId,
        rect: NormRect,
        fill_threshold: f64,
        handler: Option<Box<dyn ZoneEventHandler>>,
    ) -> Self {
        Self {
            id,
            rect,
            enabled: true,
            occupied: false,
            changed: false,
            fill_threshold,
            fill_ratio: 0.0,
            changed_at: None,
            handler,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabled zones are reported unoccupied and never raise events.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    /// True only during the update in which occupancy flipped.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn fill_ratio(&self) -> f64 {
        self.fill_ratio
    }

    pub fn changed_at(&self) -> Option<FrameStamp> {
        self.changed_at
    }

    pub fn set_handler(&mut self, handler: impl ZoneEventHandler + 'static) {
        self.handler = Some(Box::new(handler));
    }

    fn snapshot(&self, stamp: FrameStamp) -> ZoneEvent {
        ZoneEvent {
            id: self.id.clone(),
            occupied: self.occupied,
            fill_ratio: self.fill_ratio,
            stamp,
        }
    }

    /// Measures the zone against `threshold` and returns an event on a flip.
    fn evaluate(&mut self, threshold: &PixelBuffer, stamp: FrameStamp) -> Option<ZoneEvent> {
        if !self.enabled {
            self.changed = false;
            self.occupied = false;
            return None;
        }

        self.fill_ratio = fill_ratio(threshold, &self.rect);
        let occupied = self.fill_ratio > self.fill_threshold;

        if occupied == self.occupied {
            self.changed = false;
            return None;
        }

        self.changed = true;
        self.occupied = occupied;
        self.changed_at = Some(stamp);
        let event = self.snapshot(stamp);
        if let Some(handler) = self.handler.as_mut() {
            handler.on_zone_change(&event);
        }
        Some(event)
    }
}

/// Counts lit pixels inside `rect` (both edges inclusive) and divides by the
/// zone "area" `floor(w * W) + floor(h * H)`.
pub fn fill_ratio(threshold: &PixelBuffer, rect: &NormRect) -> f64 {
    let width = threshold.width() as f64;
    let height = threshold.height() as f64;
    if threshold.width() == 0 || threshold.height() == 0 {
        return 0.0;
    }

    let max_x = threshold.width() as i64 - 1;
    let max_y = threshold.height() as i64 - 1;
    let start_x = ((rect.x * width).floor() as i64).max(0);
    let start_y = ((rect.y * height).floor() as i64).max(0);
    let end_x = ((rect.right() * width).floor() as i64).min(max_x);
    let end_y = ((rect.bottom() * height).floor() as i64).min(max_y);
    let area = (rect.w * width).floor() + (rect.h * height).floor();

    let mut lit = 0u64;
    for y in start_y..=end_y {
        for x in start_x..=end_x {
            if threshold.red_at(x as u32, y as u32) != UNLIT {
                lit += 1;
            }
        }
    }

    if area <= 0.0 {
        return if lit > 0 { f64::INFINITY } else { 0.0 };
    }
    lit as f64 / area
}

/// Owns the active zones and the default fill threshold.
#[derive(Debug)]
pub struct ZoneMonitor {
    zones: Vec<ActiveZone>,
    fill_threshold: f64,
}

impl ZoneMonitor {
    pub fn new(fill_threshold: f64) -> Self {
        Self {
            zones: Vec::new(),
            fill_threshold: clamp_unit("active_zones_fill_threshold", fill_threshold),
        }
    }

    pub fn zones(&self) -> &[ActiveZone] {
        &self.zones
    }

    /// Adds a zone without a change handler.
    pub fn add(&mut self, id: impl Into<ZoneId>, rect: NormRect) -> &mut ActiveZone {
        self.push(id.into(), rect, None)
    }

    /// Adds a zone whose handler is called synchronously on every occupancy flip.
    pub fn add_with_handler(
        &mut self,
        id: impl Into<ZoneId>,
        rect: NormRect,
        handler: impl ZoneEventHandler + 'static,
    ) -> &mut ActiveZone {
        self.push(id.into(), rect, Some(Box::new(handler)))
    }

    fn push(
        &mut self,
        id: ZoneId,
        rect: NormRect,
        handler: Option<Box<dyn ZoneEventHandler>>,
    ) -> &mut ActiveZone {
        if self.zones.iter().any(|z| z.id == id) {
            warn!(zone = %id, "there are already active zones with the same id");
        }
        self.zones
            .push(ActiveZone::new(id, rect, self.fill_threshold, handler));
        let last = self.zones.len() - 1;
        &mut self.zones[last]
    }

    /// Removes every zone carrying `id`. Returns how many were removed.
    pub fn remove(&mut self, id: &ZoneId) -> usize {
        let before = self.zones.len();
        self.zones.retain(|z| &z.id != id);
        before - self.zones.len()
    }

    /// First zone with `id`.
    pub fn get(&self, id: &ZoneId) -> Option<&ActiveZone> {
        self.zones.iter().find(|z| &z.id == id)
    }

    pub fn get_mut(&mut self, id: &ZoneId) -> Option<&mut ActiveZone> {
        self.zones.iter_mut().find(|z| &z.id == id)
    }

    /// Sets the default threshold and applies it to every existing zone.
    pub fn set_fill_threshold(&mut self, value: f64) {
        self.fill_threshold = clamp_unit("active_zones_fill_threshold", value);
        for zone in &mut self.zones {
            zone.fill_threshold = self.fill_threshold;
        }
    }

    pub fn fill_threshold(&self) -> f64 {
        self.fill_threshold
    }

    /// Re-evaluates every zone. Returns the events raised by this update, in
    /// zone order.
    pub fn update(&mut self, threshold: &PixelBuffer, stamp: FrameStamp) -> Vec<ZoneEvent> {
        let mut events = Vec::new();
        for zone in &mut self.zones {
            if let Some(event) = zone.evaluate(threshold, stamp) {
                info!(
                    zone = %event.id,
                    occupied = event.occupied,
                    fill_ratio = event.fill_ratio,
                    frame = stamp.frame,
                    "active zone changed"
                );
                events.push(event);
            }
        }
        events
    }
}

/// Whether the threshold image is lit under a normalized point. Points
/// outside the image are never lit.
pub fn hit_test(threshold: &PixelBuffer, norm_x: f64, norm_y: f64) -> bool {
    let x = (norm_x * threshold.width() as f64).floor();
    let y = (norm_y * threshold.height() as f64).floor();
    if !(x >= 0.0 && y >= 0.0) {
        return false;
    }
    if x >= threshold.width() as f64 || y >= threshold.height() as f64 {
        return false;
    }
    threshold.red_at(x as u32, y as u32) != UNLIT
}
