#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// D3D feature levels the engine can run on, ordered from lowest to highest
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraFeatureLevel {
    FeatureLevel_11_0,
    FeatureLevel_11_1,
    FeatureLevel_12_0,
    FeatureLevel_12_1,
    FeatureLevel_12_2,
}

impl CeraFeatureLevel {
    /// Highest first, the order device creation tries them in
    pub const DESCENDING: [CeraFeatureLevel; 5] = [
        CeraFeatureLevel::FeatureLevel_12_2,
        CeraFeatureLevel::FeatureLevel_12_1,
        CeraFeatureLevel::FeatureLevel_12_0,
        CeraFeatureLevel::FeatureLevel_11_1,
        CeraFeatureLevel::FeatureLevel_11_0,
    ];
}

impl Default for CeraFeatureLevel {
    fn default() -> Self {
        CeraFeatureLevel::FeatureLevel_12_0
    }
}

/// D3D12 resource binding tier. Tier 3 allows fully bindless descriptor tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraResourceBindingTier {
    Tier1,
    Tier2,
    Tier3,
}

impl Default for CeraResourceBindingTier {
    fn default() -> Self {
        CeraResourceBindingTier::Tier1
    }
}

/// Immutable description of the physical GPU chosen at startup. Produced once by the backend and
/// held for the lifetime of the device context.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CeraAdapterInfo {
    pub description: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub dedicated_video_memory: u64,
    pub is_software_adapter: bool,
    pub feature_level: CeraFeatureLevel,
    pub resource_binding_tier: CeraResourceBindingTier,
    pub supports_wave_ops: bool,
    pub supports_atomic64: bool,
}

impl Default for CeraAdapterInfo {
    fn default() -> Self {
        CeraAdapterInfo {
            description: "Null Adapter".to_string(),
            vendor_id: 0,
            device_id: 0,
            dedicated_video_memory: 0,
            is_software_adapter: true,
            feature_level: CeraFeatureLevel::FeatureLevel_12_0,
            resource_binding_tier: CeraResourceBindingTier::Tier3,
            supports_wave_ops: false,
            supports_atomic64: false,
        }
    }
}

impl CeraAdapterInfo {
    pub fn supports_bindless(&self) -> bool {
        self.resource_binding_tier >= CeraResourceBindingTier::Tier3
    }
}

/// Limits and alignment requirements of the device
#[derive(Clone, Debug)]
pub struct CeraDeviceInfo {
    pub debug_names_enabled: bool,
    pub constant_buffer_alignment: u32,
    pub upload_texture_alignment: u32,
    pub upload_texture_row_alignment: u32,
    pub max_shader_visible_cbv_srv_uav_descriptors: u32,
    pub max_shader_visible_sampler_descriptors: u32,
}

impl Default for CeraDeviceInfo {
    fn default() -> Self {
        // Values match the D3D12 headers
        CeraDeviceInfo {
            debug_names_enabled: true,
            constant_buffer_alignment: 256,
            upload_texture_alignment: 512,
            upload_texture_row_alignment: 256,
            max_shader_visible_cbv_srv_uav_descriptors: 1_000_000,
            max_shader_visible_sampler_descriptors: 2048,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindless_requires_tier3() {
        let mut info = CeraAdapterInfo::default();
        info.resource_binding_tier = CeraResourceBindingTier::Tier2;
        assert!(!info.supports_bindless());
        info.resource_binding_tier = CeraResourceBindingTier::Tier3;
        assert!(info.supports_bindless());
    }

    #[test]
    fn test_feature_level_ordering() {
        assert!(CeraFeatureLevel::FeatureLevel_12_1 > CeraFeatureLevel::FeatureLevel_12_0);
        assert_eq!(
            CeraFeatureLevel::DESCENDING[0],
            CeraFeatureLevel::FeatureLevel_12_2
        );
    }
}
