//! Processor implementations for the pullweld library.
//!
//! This module provides the transform stages that sit between a source and
//! its consumer: element-wise maps, stream-valued maps, truncation by a
//! notifier, and a timer that turns its input into a clock.

pub mod interval;
pub mod map;
pub mod switch_map;
pub mod take_until;

pub use interval::{interval, interval_with_clock, Interval};
pub use map::{map, map_async, try_map, Map, MapAsync, TryMap};
pub use switch_map::{
    switch_map, switch_map_with, InnerOnly, Pairing, Pairwise, SwitchMap, SwitchMapOptions,
    SwitchMode,
};
pub use take_until::{take_until, TakeUntil};
