//! Bar source port trait.

use crate::domain::bar::Bar;
use crate::domain::error::ImatradeError;

pub trait BarSource {
    /// All bars for `instrument`, oldest first, strictly increasing in time.
    fn fetch_bars(&self, instrument: &str) -> Result<Vec<Bar>, ImatradeError>;

    fn list_instruments(&self) -> Result<Vec<String>, ImatradeError>;
}
