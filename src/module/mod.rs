use crate::routing::Catalog;

/// Trait for application modules
///
/// Modules are typically defined using the `#[module]` macro, which
/// implements this trait and registers the listed controllers and imported
/// modules into the catalog the scanner reads.
///
/// # Example
/// ```rust,ignore
/// use trellis::module;
///
/// #[module(
///     imports = [AdminModule],
///     controllers = [UserController, ReportController],
/// )]
/// pub struct AppModule;
/// ```
pub trait Module {
    /// Register all controllers of this module and of its imports
    fn register(catalog: &mut Catalog);
}
