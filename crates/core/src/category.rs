use serde::{Deserialize, Serialize};

/// Name assigned when nothing else claims a transaction.
pub const FALLBACK_CATEGORY: &str = "Other";

/// Built-in categories as `(name, is_income)`.
pub const BUILTIN_CATEGORIES: &[(&str, bool)] = &[
    ("Groceries", false),
    ("Fuel", false),
    ("Dining", false),
    ("Transport", false),
    ("Utilities", false),
    ("Rent", false),
    ("Insurance", false),
    ("Medical", false),
    ("Entertainment", false),
    ("Shopping", false),
    ("Bank Charges", false),
    ("Transfers", false),
    ("Salary", true),
    ("Interest", true),
    ("Other Income", true),
    (FALLBACK_CATEGORY, false),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    /// Read by VAT classification downstream; carried through unchanged.
    #[serde(default)]
    pub is_income: bool,
}

impl Category {
    pub fn new(name: impl Into<String>, is_income: bool) -> Self {
        Self { name: name.into(), is_income }
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_CATEGORY, false)
    }
}

/// The built-in categories plus a caller-supplied custom set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryCatalog {
    #[serde(default)]
    custom: Vec<Category>,
}

impl CategoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_custom(custom: Vec<Category>) -> Self {
        Self { custom }
    }

    pub fn custom(&self) -> &[Category] {
        &self.custom
    }

    /// Resolve a category name. Built-ins win over custom entries of the same
    /// name; names found in neither set resolve to a non-income category.
    pub fn resolve(&self, name: &str) -> Category {
        if let Some((builtin, is_income)) = BUILTIN_CATEGORIES.iter().find(|(n, _)| *n == name) {
            return Category::new(*builtin, *is_income);
        }
        self.custom
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .unwrap_or_else(|| Category::new(name, false))
    }

    pub fn contains(&self, name: &str) -> bool {
        BUILTIN_CATEGORIES.iter().any(|(n, _)| *n == name) || self.custom.iter().any(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        BUILTIN_CATEGORIES
            .iter()
            .map(|(n, _)| *n)
            .chain(self.custom.iter().map(|c| c.name.as_str()))
    }
}
