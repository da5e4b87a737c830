//! Catalogue of trace attributes and their conventional SEG-Y locations.

use serde::{Deserialize, Serialize};

/// Semantically named per-trace attribute.
///
/// New attributes are added by extending this enum and the default mapping in
/// [`Meta::default_encoding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Meta {
    /// Verbatim copy of the whole trace header.
    Copy,
    /// Local trace number (in-memory only).
    Ltn,
    /// Global trace number (in-memory only).
    Gtn,
    /// Trace sequence number within line.
    Tnl,
    /// Trace sequence number within file.
    Tn,
    /// Trace number within the original field record.
    Tnr,
    /// Trace number within the ensemble.
    Tne,
    /// Ensemble (CDP) number.
    Cdp,
    /// Energy source point number.
    SrcNum,
    /// Trace identification code.
    Tic,
    /// Number of vertically summed traces.
    VStack,
    /// Number of horizontally stacked traces.
    HStack,
    /// Source to receiver distance.
    Offset,
    /// Receiver group elevation.
    RgElev,
    /// Surface elevation at source.
    SsElev,
    /// Source depth below surface.
    SrcDpth,
    /// Water depth at source.
    WtrDepSrc,
    /// Water depth at receiver group.
    WtrDepRcv,
    XSrc,
    YSrc,
    XRcv,
    YRcv,
    XCmp,
    YCmp,
    /// Inline number.
    Il,
    /// Crossline number.
    Xl,
    /// Shot point number, scaled by its own scalar.
    ShotNum,
    /// Number of samples mirrored in the trace header.
    Ns,
    /// Sample interval in microseconds mirrored in the trace header.
    SampleInterval,
    /// Trace value measurement unit.
    TraceUnit,
}

/// 1-based byte locations of the SEG-Y trace header fields used by the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum TraceHeaderField {
    SeqNum = 1,
    SeqFNum = 5,
    TorF = 13,
    SrcNum = 17,
    Cdp = 21,
    TrcNumEns = 25,
    Tic = 29,
    VStackCnt = 31,
    HStackCnt = 33,
    CDist = 37,
    RgElev = 41,
    SsElev = 45,
    SrcDpth = 49,
    WtrDepSrc = 61,
    WtrDepRcv = 65,
    ScaleElev = 69,
    ScaleCoord = 71,
    XSrc = 73,
    YSrc = 77,
    XRcv = 81,
    YRcv = 85,
    Ns = 115,
    Inc = 117,
    XCmp = 181,
    YCmp = 185,
    Il = 189,
    Xl = 193,
    ShotNum = 197,
    ShotScal = 201,
    ValMeas = 203,
}

impl TraceHeaderField {
    /// 1-based byte location within the trace header.
    #[must_use]
    pub const fn loc(self) -> usize {
        self as usize
    }
}

/// On-disk encoding of an attribute, independent of any rule set ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Long(TraceHeaderField),
    Short(TraceHeaderField),
    ScaledFloat {
        loc: TraceHeaderField,
        scalar: TraceHeaderField,
    },
    Index,
    Copy,
}

impl Meta {
    /// Every catalogued attribute, in declaration order.
    pub const ALL: [Meta; 30] = [
        Meta::Copy,
        Meta::Ltn,
        Meta::Gtn,
        Meta::Tnl,
        Meta::Tn,
        Meta::Tnr,
        Meta::Tne,
        Meta::Cdp,
        Meta::SrcNum,
        Meta::Tic,
        Meta::VStack,
        Meta::HStack,
        Meta::Offset,
        Meta::RgElev,
        Meta::SsElev,
        Meta::SrcDpth,
        Meta::WtrDepSrc,
        Meta::WtrDepRcv,
        Meta::XSrc,
        Meta::YSrc,
        Meta::XRcv,
        Meta::YRcv,
        Meta::XCmp,
        Meta::YCmp,
        Meta::Il,
        Meta::Xl,
        Meta::ShotNum,
        Meta::Ns,
        Meta::SampleInterval,
        Meta::TraceUnit,
    ];

    /// Conventional SEG-Y encoding for this attribute.
    #[must_use]
    pub const fn default_encoding(self) -> Encoding {
        use TraceHeaderField as Tr;
        match self {
            Meta::Copy => Encoding::Copy,
            Meta::Ltn | Meta::Gtn => Encoding::Index,
            Meta::Tnl => Encoding::Long(Tr::SeqNum),
            Meta::Tn => Encoding::Long(Tr::SeqFNum),
            Meta::Tnr => Encoding::Long(Tr::TorF),
            Meta::Tne => Encoding::Long(Tr::TrcNumEns),
            Meta::Cdp => Encoding::Long(Tr::Cdp),
            Meta::SrcNum => Encoding::Long(Tr::SrcNum),
            Meta::Tic => Encoding::Short(Tr::Tic),
            Meta::VStack => Encoding::Short(Tr::VStackCnt),
            Meta::HStack => Encoding::Short(Tr::HStackCnt),
            Meta::Offset => Encoding::Long(Tr::CDist),
            Meta::RgElev => Encoding::ScaledFloat {
                loc: Tr::RgElev,
                scalar: Tr::ScaleElev,
            },
            Meta::SsElev => Encoding::ScaledFloat {
                loc: Tr::SsElev,
                scalar: Tr::ScaleElev,
            },
            Meta::SrcDpth => Encoding::ScaledFloat {
                loc: Tr::SrcDpth,
                scalar: Tr::ScaleElev,
            },
            Meta::WtrDepSrc => Encoding::ScaledFloat {
                loc: Tr::WtrDepSrc,
                scalar: Tr::ScaleElev,
            },
            Meta::WtrDepRcv => Encoding::ScaledFloat {
                loc: Tr::WtrDepRcv,
                scalar: Tr::ScaleElev,
            },
            Meta::XSrc => Encoding::ScaledFloat {
                loc: Tr::XSrc,
                scalar: Tr::ScaleCoord,
            },
            Meta::YSrc => Encoding::ScaledFloat {
                loc: Tr::YSrc,
                scalar: Tr::ScaleCoord,
            },
            Meta::XRcv => Encoding::ScaledFloat {
                loc: Tr::XRcv,
                scalar: Tr::ScaleCoord,
            },
            Meta::YRcv => Encoding::ScaledFloat {
                loc: Tr::YRcv,
                scalar: Tr::ScaleCoord,
            },
            Meta::XCmp => Encoding::ScaledFloat {
                loc: Tr::XCmp,
                scalar: Tr::ScaleCoord,
            },
            Meta::YCmp => Encoding::ScaledFloat {
                loc: Tr::YCmp,
                scalar: Tr::ScaleCoord,
            },
            Meta::Il => Encoding::Long(Tr::Il),
            Meta::Xl => Encoding::Long(Tr::Xl),
            Meta::ShotNum => Encoding::ScaledFloat {
                loc: Tr::ShotNum,
                scalar: Tr::ShotScal,
            },
            Meta::Ns => Encoding::Short(Tr::Ns),
            Meta::SampleInterval => Encoding::Short(Tr::Inc),
            Meta::TraceUnit => Encoding::Short(Tr::ValMeas),
        }
    }

    /// Attributes registered by [`crate::Rule::with_defaults`].
    pub const DEFAULTS: [Meta; 13] = [
        Meta::WtrDepSrc,
        Meta::WtrDepRcv,
        Meta::XSrc,
        Meta::YSrc,
        Meta::XRcv,
        Meta::YRcv,
        Meta::XCmp,
        Meta::YCmp,
        Meta::Offset,
        Meta::Il,
        Meta::Xl,
        Meta::Tn,
        Meta::Gtn,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_locations_match_segy_rev1() {
        assert_eq!(TraceHeaderField::ScaleCoord.loc(), 71);
        assert_eq!(TraceHeaderField::Il.loc(), 189);
        assert_eq!(TraceHeaderField::Xl.loc(), 193);
        assert_eq!(
            Meta::XSrc.default_encoding(),
            Encoding::ScaledFloat {
                loc: TraceHeaderField::XSrc,
                scalar: TraceHeaderField::ScaleCoord
            }
        );
        assert_eq!(Meta::Gtn.default_encoding(), Encoding::Index);
    }

    #[test]
    fn catalogue_is_complete() {
        let mut seen = std::collections::BTreeSet::new();
        for meta in Meta::ALL {
            assert!(seen.insert(meta), "{meta:?} listed twice");
        }
        for meta in Meta::DEFAULTS {
            assert!(seen.contains(&meta));
        }
    }
}
