//! Choice of the fields a layered reader decodes.

/// Set of fields to decode when reading layered (v3) items.
///
/// x, y, return numbers and the scanner channel are always decoded.
/// A field that is not selected keeps, for the whole chunk, the value
/// it has in the first point of that chunk.
///
/// Items that are not layered decode every field whatever the selection.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct DecompressionSelection(pub u32);

macro_rules! selectable_fields {
    ($($mask:ident => $decompress:ident, $skip:ident, $should:ident;)+) => {
        $(
            pub fn $decompress(self) -> Self {
                Self(self.0 | Self::$mask)
            }

            pub fn $skip(self) -> Self {
                Self(self.0 & !Self::$mask)
            }

            pub fn $should(self) -> bool {
                self.0 & Self::$mask != 0
            }
        )+
    };
}

impl DecompressionSelection {
    pub const ALL: u32 = u32::MAX;
    pub const Z: u32 = 1 << 0;
    pub const CLASSIFICATION: u32 = 1 << 1;
    pub const FLAGS: u32 = 1 << 2;
    pub const INTENSITY: u32 = 1 << 3;
    pub const SCAN_ANGLE: u32 = 1 << 4;
    pub const USER_DATA: u32 = 1 << 5;
    pub const POINT_SOURCE_ID: u32 = 1 << 6;
    pub const GPS_TIME: u32 = 1 << 7;
    pub const RGB: u32 = 1 << 8;
    pub const NIR: u32 = 1 << 9;
    pub const WAVEPACKET: u32 = 1 << 10;
    pub const ALL_EXTRA_BYTES: u32 = 1 << 11;

    pub fn all() -> Self {
        Self(Self::ALL)
    }

    /// Only the fields that cannot be skipped
    pub fn base() -> Self {
        Self(0)
    }

    selectable_fields! {
        Z => decompress_z, skip_z, should_decompress_z;
        CLASSIFICATION =>
            decompress_classification, skip_classification, should_decompress_classification;
        FLAGS => decompress_flags, skip_flags, should_decompress_flags;
        INTENSITY => decompress_intensity, skip_intensity, should_decompress_intensity;
        SCAN_ANGLE => decompress_scan_angle, skip_scan_angle, should_decompress_scan_angle;
        USER_DATA => decompress_user_data, skip_user_data, should_decompress_user_data;
        POINT_SOURCE_ID =>
            decompress_point_source_id, skip_point_source_id, should_decompress_point_source_id;
        GPS_TIME => decompress_gps_time, skip_gps_time, should_decompress_gps_time;
        RGB => decompress_rgb, skip_rgb, should_decompress_rgb;
        NIR => decompress_nir, skip_nir, should_decompress_nir;
        WAVEPACKET => decompress_wavepacket, skip_wavepacket, should_decompress_wavepacket;
        ALL_EXTRA_BYTES => decompress_extra_bytes, skip_extra_bytes, should_decompress_extra_bytes;
    }
}

impl Default for DecompressionSelection {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_base_selects_nothing_optional() {
        let selection = DecompressionSelection::base();
        assert!(!selection.should_decompress_z());
        assert!(!selection.should_decompress_gps_time());
        assert!(!selection.should_decompress_extra_bytes());
    }

    #[test]
    fn test_setters_only_touch_their_field() {
        let selection = DecompressionSelection::base()
            .decompress_rgb()
            .decompress_intensity();
        assert!(selection.should_decompress_rgb());
        assert!(selection.should_decompress_intensity());
        assert!(!selection.should_decompress_nir());

        let selection = DecompressionSelection::all().skip_rgb();
        assert!(!selection.should_decompress_rgb());
        assert!(selection.should_decompress_nir());
        assert!(selection.should_decompress_wavepacket());
    }

    #[test]
    fn test_default_decodes_everything() {
        assert_eq!(DecompressionSelection::default(), DecompressionSelection::all());
    }
}
