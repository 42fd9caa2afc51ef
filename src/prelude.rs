#![allow(unused_imports)]

pub use crate::error::{LoaderError, Result};
pub use anyhow::{anyhow, bail, Context};
pub use async_trait::async_trait;
pub use log::{debug, error, info, trace, warn};
pub use std::sync::{Arc, Mutex};
