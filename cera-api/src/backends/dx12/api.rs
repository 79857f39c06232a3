use crate::dx12::{CeraDeviceContextDx12, CeraDeviceContextDx12Inner};
use crate::{CeraApiDef, CeraApiDefDx12, CeraResult};
use std::sync::Arc;

pub struct CeraApiDx12 {
    device_context: Option<CeraDeviceContextDx12>,
}

impl Drop for CeraApiDx12 {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            log::error!("Error destroying dx12 API: {}", e);
        }
    }
}

impl CeraApiDx12 {
    pub fn device_context(&self) -> &CeraDeviceContextDx12 {
        self.device_context.as_ref().unwrap()
    }

    pub fn new(
        api_def: &CeraApiDef,
        dx12_api_def: &CeraApiDefDx12,
    ) -> CeraResult<Self> {
        let inner = Arc::new(CeraDeviceContextDx12Inner::new(api_def, dx12_api_def)?);
        let device_context = CeraDeviceContextDx12::new(inner);

        Ok(CeraApiDx12 {
            device_context: Some(device_context),
        })
    }

    pub fn destroy(&mut self) -> CeraResult<()> {
        if let Some(device_context) = self.device_context.take() {
            let inner = device_context.inner.clone();

            // This should be the final device context
            std::mem::drop(device_context);

            let strong_count = Arc::strong_count(&inner);
            match Arc::try_unwrap(inner) {
                Ok(inner) => std::mem::drop(inner),
                Err(_arc) => {
                    Err(format!(
                        "Could not destroy device, {} references to it exist",
                        strong_count
                    ))?;
                }
            }
        }

        Ok(())
    }
}
