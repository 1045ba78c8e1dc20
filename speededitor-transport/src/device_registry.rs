//! Device registry - USB identifiers of supported control surfaces
//!
//! Only the Speed Editor is supported; its report layouts are specific to
//! this VID/PID pair.

/// Blackmagic Design vendor ID
pub const VENDOR_ID: u16 = 0x1edb;

/// DaVinci Resolve Speed Editor product ID
pub const PRODUCT_ID: u16 = 0xda0e;

/// Check if a VID/PID pair identifies a Speed Editor
#[inline]
pub fn is_speed_editor(vid: u16, pid: u16) -> bool {
    vid == VENDOR_ID && pid == PRODUCT_ID
}
