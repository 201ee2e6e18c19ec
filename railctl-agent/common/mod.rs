pub mod devmem;
pub mod nvmem;
pub mod port;

pub use devmem::{DevMemPort, DevMemProvider};
pub use nvmem::{CalibrationStore, NvmemFileStore, StaticStore};
pub use port::{acquire_port, MemoryPort, PortProvider, RegisterPort, StaticProvider};
