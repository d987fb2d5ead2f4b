// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use edgeview::constants::{CapturePreset, EDGE_HIGH_THRESHOLD, EDGE_LOW_THRESHOLD};

#[test]
fn test_capture_preset_values() {
    assert_eq!(CapturePreset::ALL.len(), 3);
}

#[test]
fn test_capture_preset_ordering() {
    // Presets are ordered from smallest to largest frame
    let mut prev_bytes = 0usize;
    for preset in CapturePreset::ALL {
        let bytes = preset.packed_frame_bytes();
        assert!(
            bytes > prev_bytes,
            "Presets should be ordered from smallest to largest"
        );
        prev_bytes = bytes;
    }
}

#[test]
fn test_capture_preset_dimensions_are_even() {
    for preset in CapturePreset::ALL {
        let (w, h) = preset.dimensions();
        assert_eq!(w % 2, 0, "{:?} width must be even", preset);
        assert_eq!(h % 2, 0, "{:?} height must be even", preset);
    }
}

#[test]
fn test_packed_frame_bytes_is_one_and_a_half_per_pixel() {
    assert_eq!(CapturePreset::Vga.packed_frame_bytes(), 640 * 480 * 3 / 2);
}

#[test]
fn test_capture_preset_display_names() {
    for preset in CapturePreset::ALL {
        let name = preset.display_name();
        assert!(
            !name.is_empty(),
            "Preset {:?} has empty display name",
            preset
        );
    }
}

#[test]
fn test_edge_thresholds_ordered() {
    assert!(EDGE_LOW_THRESHOLD < EDGE_HIGH_THRESHOLD);
}

#[test]
fn test_capture_preset_parses_cli_names() {
    assert_eq!("vga".parse::<CapturePreset>(), Ok(CapturePreset::Vga));
    assert_eq!("HD".parse::<CapturePreset>(), Ok(CapturePreset::Hd));
    assert_eq!("720p".parse::<CapturePreset>(), Ok(CapturePreset::Hd));
    assert_eq!("fullhd".parse::<CapturePreset>(), Ok(CapturePreset::FullHd));
    assert_eq!("1080p".parse::<CapturePreset>(), Ok(CapturePreset::FullHd));
    assert!("4k".parse::<CapturePreset>().is_err());
}
