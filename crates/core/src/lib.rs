pub mod category;
pub mod layout;
pub mod money;
pub mod transaction;
pub mod warning;

pub use category::{Category, CategoryCatalog, BUILTIN_CATEGORIES, FALLBACK_CATEGORY};
pub use layout::{
    AmountType, DocumentLayout, LayoutError, PageRegionText, PageRegions, Region, RegionKind,
};
pub use money::Money;
pub use transaction::{BankFormatVariant, Transaction};
pub use warning::{Warning, WarningKind};
