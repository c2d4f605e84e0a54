//! Macros for plugin crates.

/// Export a plugin crate's registration function from a shared library.
///
/// Generates the symbols `DirectoryDiscovery` looks for. `$register` is a
/// `fn(&mut PluginRegistrar)`.
///
/// # Example
/// ```rust,ignore
/// use lamtamnix_plugin::prelude::*;
///
/// pub fn register(registrar: &mut PluginRegistrar) {
///     registrar.register(plugin_type!(MyPlugin));
/// }
///
/// export_plugins!(register);
/// ```
#[macro_export]
macro_rules! export_plugins {
    ($register:path) => {
        #[doc(hidden)]
        #[unsafe(no_mangle)]
        pub static LAMTAMNIX_PLUGIN_ABI: u32 = $crate::PLUGIN_ABI_VERSION;

        #[doc(hidden)]
        #[unsafe(no_mangle)]
        pub fn lamtamnix_register_plugins(registrar: &mut $crate::PluginRegistrar) {
            $register(registrar)
        }
    };
}

/// Descriptor for a concrete plugin type constructed with `Default`.
///
/// The type name is the type as written, prefixed with the module path of
/// the call site.
///
/// # Example
/// ```rust,ignore
/// let descriptor = plugin_type!(EchoPlugin);
/// assert_eq!(descriptor.type_name(), "my_crate::EchoPlugin");
/// ```
#[macro_export]
macro_rules! plugin_type {
    ($ty:ty) => {
        $crate::prelude::PluginTypeDescriptor::concrete(
            concat!(module_path!(), "::", stringify!($ty)),
            $crate::prelude::PLUGIN_CAPABILITY,
            || {
                Ok(Box::new(<$ty as ::std::default::Default>::default())
                    as Box<dyn $crate::prelude::Plugin>)
            },
        )
    };
}
