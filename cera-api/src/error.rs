use crate::{CeraBackendType, CeraDescriptorHeapType, CeraQueueType, CeraResourceId};
use std::time::Duration;

pub type CeraResult<T> = Result<T, CeraError>;

/// Generic error that contains all the different kinds of errors that may occur when using the API
#[derive(Debug, Clone)]
pub enum CeraError {
    StringError(String),

    /// Validation was required by `CeraValidationMode::Enabled` but could not be turned on
    ValidationRequiredButUnavailable,

    /// None of the backends in the preference list could be created
    NoSupportedBackend(Vec<CeraBackendType>),

    /// The GPU stopped responding or was removed. Nothing submitted to the device can be trusted
    /// to complete after this.
    DeviceLost {
        operation: String,
        queue_type: Option<CeraQueueType>,
        fence_value: Option<u64>,
    },

    /// A fence did not reach the requested value within the configured timeout. Treated as a
    /// hung device.
    FenceWaitTimeout {
        queue_type: CeraQueueType,
        fence_value: u64,
        completed_value: u64,
        timeout: Duration,
    },

    /// The backend refused to create a resource, heap or pipeline object
    ResourceCreationFailed(String),

    /// Upload allocations can never be larger than a page
    AllocationExceedsPageSize { requested: u64, page_size: u64 },

    /// Alignment must be a non-zero power of two
    InvalidAlignment(u64),

    /// The resource was never registered with the state tracker, so its current state is unknown
    UnregisteredResource(CeraResourceId),

    /// A descriptor range was released that is not currently allocated
    DescriptorDoubleFree {
        heap_type: CeraDescriptorHeapType,
        page: usize,
        offset: u32,
        count: u32,
    },

    /// Waited for a fence value that the queue has not signaled yet, the wait would never end
    FenceValueNotSubmitted {
        queue_type: CeraQueueType,
        fence_value: u64,
        last_signaled: u64,
    },

    /// A recording context was submitted to a queue of a different type than it was created for.
    /// `expected` is the queue's type, `actual` the context's.
    QueueMismatch {
        expected: CeraQueueType,
        actual: CeraQueueType,
    },

    /// The queue has been shut down and no longer accepts work
    QueueShutDown(CeraQueueType),

    #[cfg(feature = "cera-dx12")]
    WindowsApiError(windows::core::Error),
}

impl CeraError {
    /// True for the errors that mean the device can no longer be used
    pub fn is_device_lost(&self) -> bool {
        match self {
            CeraError::DeviceLost { .. } | CeraError::FenceWaitTimeout { .. } => true,
            _ => false,
        }
    }
}

impl std::error::Error for CeraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            #[cfg(feature = "cera-dx12")]
            CeraError::WindowsApiError(ref e) => Some(e),
            _ => None,
        }
    }
}

impl core::fmt::Display for CeraError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            CeraError::StringError(ref e) => e.fmt(fmt),
            CeraError::ValidationRequiredButUnavailable => {
                write!(fmt, "Validation was requested but is not available")
            }
            CeraError::NoSupportedBackend(ref tried) => {
                write!(fmt, "No supported graphics backend (tried {:?})", tried)
            }
            CeraError::DeviceLost {
                ref operation,
                queue_type,
                fence_value,
            } => write!(
                fmt,
                "Device lost during {} (queue: {:?}, fence value: {:?})",
                operation, queue_type, fence_value
            ),
            CeraError::FenceWaitTimeout {
                queue_type,
                fence_value,
                completed_value,
                timeout,
            } => write!(
                fmt,
                "Timed out after {:?} waiting for {:?} queue to reach fence value {} (completed: {})",
                timeout, queue_type, fence_value, completed_value
            ),
            CeraError::ResourceCreationFailed(ref e) => {
                write!(fmt, "Resource creation failed: {}", e)
            }
            CeraError::AllocationExceedsPageSize {
                requested,
                page_size,
            } => write!(
                fmt,
                "Requested {} bytes but upload pages are only {} bytes",
                requested, page_size
            ),
            CeraError::InvalidAlignment(alignment) => {
                write!(fmt, "Alignment {} is not a power of two", alignment)
            }
            CeraError::UnregisteredResource(id) => {
                write!(fmt, "{} is not registered with the state tracker", id)
            }
            CeraError::DescriptorDoubleFree {
                heap_type,
                page,
                offset,
                count,
            } => write!(
                fmt,
                "Descriptor range {:?} page {} offset {} count {} released while not allocated",
                heap_type, page, offset, count
            ),
            CeraError::FenceValueNotSubmitted {
                queue_type,
                fence_value,
                last_signaled,
            } => write!(
                fmt,
                "Fence value {} was never signaled on the {:?} queue (last signaled: {})",
                fence_value, queue_type, last_signaled
            ),
            CeraError::QueueMismatch { expected, actual } => write!(
                fmt,
                "Recording context for a {:?} queue submitted to a {:?} queue",
                actual, expected
            ),
            CeraError::QueueShutDown(queue_type) => {
                write!(fmt, "The {:?} queue has been shut down", queue_type)
            }
            #[cfg(feature = "cera-dx12")]
            CeraError::WindowsApiError(ref e) => e.fmt(fmt),
        }
    }
}

impl From<&str> for CeraError {
    fn from(str: &str) -> Self {
        CeraError::StringError(str.to_string())
    }
}

impl From<String> for CeraError {
    fn from(string: String) -> Self {
        CeraError::StringError(string)
    }
}

#[cfg(feature = "cera-dx12")]
impl From<windows::core::Error> for CeraError {
    fn from(error: windows::core::Error) -> Self {
        CeraError::WindowsApiError(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_lost_classification() {
        let timeout = CeraError::FenceWaitTimeout {
            queue_type: CeraQueueType::Graphics,
            fence_value: 3,
            completed_value: 2,
            timeout: Duration::from_millis(10),
        };
        assert!(timeout.is_device_lost());

        let lost = CeraError::DeviceLost {
            operation: "submit".to_string(),
            queue_type: Some(CeraQueueType::Compute),
            fence_value: None,
        };
        assert!(lost.is_device_lost());

        assert!(!CeraError::InvalidAlignment(3).is_device_lost());
        assert!(!CeraError::from("message").is_device_lost());
    }

    #[test]
    fn test_display_names_values() {
        let error = CeraError::AllocationExceedsPageSize {
            requested: 100,
            page_size: 64,
        };
        let message = format!("{}", error);
        assert!(message.contains("100"));
        assert!(message.contains("64"));
    }
}
