#[cfg(feature = "cera-dx12")]
use crate::dx12::CeraApiDx12;
use crate::null::CeraApiNull;
use crate::*;

/// Primary entry point to using the API. Use `new` to pick a backend from a preference list, or
/// the `new_*` functions to initialize a specific one.
///
/// **This API object must persist for the lifetime of all objects created through it.**
///
/// Once the API object is created, use `device_context()` to obtain a cloneable handle to the
/// device. The `CeraDeviceContext` is the primary way of interacting with the API once it has been
/// initialized.
pub enum CeraApi {
    #[cfg(feature = "cera-dx12")]
    Dx12(CeraApiDx12),
    Null(CeraApiNull),
}

impl CeraApi {
    /// Try each backend in `api_def.backend_preference` in order and return the first that
    /// initializes. A backend that is not compiled in, not implemented, or fails to create a
    /// device is skipped with a warning. If nothing works the error is fatal.
    pub fn new(
        api_def: &CeraApiDef,
        dx12_api_def: &CeraApiDefDx12,
        null_api_def: &CeraApiDefNull,
    ) -> CeraResult<Self> {
        for &backend_type in &api_def.backend_preference {
            match Self::new_backend(backend_type, api_def, dx12_api_def, null_api_def) {
                Ok(api) => {
                    log::info!("Using {:?} backend", backend_type);
                    return Ok(api);
                }
                Err(e) => {
                    log::warn!("Could not create {:?} backend: {}", backend_type, e);
                }
            }
        }

        log::error!(
            "None of the preferred backends {:?} could be created",
            api_def.backend_preference
        );
        Err(CeraError::NoSupportedBackend(
            api_def.backend_preference.clone(),
        ))
    }

    #[allow(unreachable_code)]
    fn new_backend(
        backend_type: CeraBackendType,
        api_def: &CeraApiDef,
        _dx12_api_def: &CeraApiDefDx12,
        null_api_def: &CeraApiDefNull,
    ) -> CeraResult<Self> {
        match backend_type {
            CeraBackendType::Dx12 => {
                #[cfg(feature = "cera-dx12")]
                {
                    return CeraApi::new_dx12(api_def, _dx12_api_def);
                }

                Err("cera was compiled without the cera-dx12 feature")?
            }
            CeraBackendType::Null => CeraApi::new_null(api_def, null_api_def),
            CeraBackendType::Dx11 | CeraBackendType::OpenGl => {
                Err(format!("The {:?} backend is not implemented", backend_type))?
            }
        }
    }

    /// Initialize a device using Direct3D 12
    #[cfg(feature = "cera-dx12")]
    pub fn new_dx12(
        api_def: &CeraApiDef,
        dx12_api_def: &CeraApiDefDx12,
    ) -> CeraResult<Self> {
        Ok(CeraApi::Dx12(CeraApiDx12::new(api_def, dx12_api_def)?))
    }

    /// Initialize a device with no GPU behind it
    pub fn new_null(
        api_def: &CeraApiDef,
        null_api_def: &CeraApiDefNull,
    ) -> CeraResult<Self> {
        Ok(CeraApi::Null(CeraApiNull::new(api_def, null_api_def)?))
    }

    pub fn backend_type(&self) -> CeraBackendType {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraApi::Dx12(_) => CeraBackendType::Dx12,
            CeraApi::Null(_) => CeraBackendType::Null,
        }
    }

    /// Create a cloneable handle to the device. Most of the interaction with the graphics backend
    /// is done through this handle.
    pub fn device_context(&self) -> CeraDeviceContext {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraApi::Dx12(inner) => CeraDeviceContext::Dx12(inner.device_context().clone()),
            CeraApi::Null(inner) => CeraDeviceContext::Null(inner.device_context().clone()),
        }
    }

    /// Destroys the graphics API instance. Any `CeraDeviceContext` created through this API, and
    /// any object created through those device contexts, must be dropped before calling destroy()
    ///
    /// `destroy()` is automatically called if CeraApi is dropped and it has not yet been called, so
    /// it is not necessary to call this function explicitly.
    pub fn destroy(&mut self) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraApi::Dx12(inner) => inner.destroy(),
            CeraApi::Null(inner) => inner.destroy(),
        }
    }

    #[cfg(feature = "cera-dx12")]
    pub fn dx12_api(&self) -> Option<&CeraApiDx12> {
        match self {
            CeraApi::Dx12(inner) => Some(inner),
            CeraApi::Null(_) => None,
        }
    }

    #[allow(unreachable_patterns)]
    pub fn null_api(&self) -> Option<&CeraApiNull> {
        match self {
            CeraApi::Null(inner) => Some(inner),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_falls_back_to_next_backend() {
        let api_def = CeraApiDef {
            validation_mode: CeraValidationMode::Disabled,
            backend_preference: vec![
                CeraBackendType::Dx11,
                CeraBackendType::OpenGl,
                CeraBackendType::Null,
            ],
        };

        let api = CeraApi::new(&api_def, &Default::default(), &Default::default()).unwrap();
        assert_eq!(api.backend_type(), CeraBackendType::Null);
        assert!(api.null_api().is_some());
    }

    #[test]
    fn test_no_supported_backend_is_fatal() {
        let api_def = CeraApiDef {
            validation_mode: CeraValidationMode::Disabled,
            backend_preference: vec![CeraBackendType::Dx11, CeraBackendType::OpenGl],
        };

        match CeraApi::new(&api_def, &Default::default(), &Default::default()) {
            Err(CeraError::NoSupportedBackend(tried)) => assert_eq!(tried.len(), 2),
            Err(e) => panic!("unexpected error {:?}", e),
            Ok(_) => panic!("expected no backend to be created"),
        }
    }

    #[cfg(not(feature = "cera-dx12"))]
    #[test]
    fn test_dx12_skipped_when_not_compiled_in() {
        let api = CeraApi::new(&Default::default(), &Default::default(), &Default::default())
            .unwrap();
        assert_eq!(api.backend_type(), CeraBackendType::Null);
    }

    #[test]
    fn test_adapter_info_passed_through() {
        let mut null_api_def = CeraApiDefNull::default();
        null_api_def.adapter_info.description = "Test Adapter".to_string();
        null_api_def.adapter_info.resource_binding_tier = CeraResourceBindingTier::Tier2;

        let api = CeraApi::new_null(&Default::default(), &null_api_def).unwrap();
        let device_context = api.device_context();
        assert_eq!(device_context.adapter_info().description, "Test Adapter");
        assert!(!device_context.adapter_info().supports_bindless());
    }
}
