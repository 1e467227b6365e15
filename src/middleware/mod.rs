pub mod timing;

pub use timing::{FetchInterceptor, InstrumentOptions, UnclassifiedHook};
