use crate::null::CeraDeviceContextNull;
use crate::{CeraApiDef, CeraApiDefNull, CeraResult};
use std::sync::Arc;

pub struct CeraApiNull {
    device_context: Option<CeraDeviceContextNull>,
}

impl CeraApiNull {
    pub fn new(
        _api_def: &CeraApiDef,
        null_api_def: &CeraApiDefNull,
    ) -> CeraResult<Self> {
        let device_context = CeraDeviceContextNull::new(null_api_def)?;

        Ok(CeraApiNull {
            device_context: Some(device_context),
        })
    }

    pub fn device_context(&self) -> &CeraDeviceContextNull {
        self.device_context.as_ref().unwrap()
    }

    pub fn destroy(&mut self) -> CeraResult<()> {
        if let Some(device_context) = self.device_context.take() {
            let strong_count = Arc::strong_count(&device_context.inner);
            if strong_count > 1 {
                log::warn!(
                    "Destroying null API with {} outstanding references to the device context",
                    strong_count - 1
                );
            }
        }

        Ok(())
    }
}

impl Drop for CeraApiNull {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            log::error!("Error destroying null API: {}", e);
        }
    }
}
