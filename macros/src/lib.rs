//! Derive macros for the payout engine.
//!
//! # Available Macros
//!
//! - `#[derive(Action)]` - generates helpers for action enums whose variants
//!   are tagged `#[command]` or `#[event]`
//! - `#[derive(State)]` - generates a version accessor pair for the field
//!   tagged `#[version]` (optimistic concurrency)
//!
//! # Example
//!
//! ```ignore
//! use payouts_macros::Action;
//!
//! #[derive(Action, Clone, Debug)]
//! enum LedgerAction {
//!     #[command]
//!     Credit { amount: Money },
//!
//!     #[event]
//!     Credited { amount: Money },
//! }
//!
//! assert!(LedgerAction::Credit { amount }.is_command());
//! assert_eq!(LedgerAction::Credited { amount }.name(), "Credited");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields};

/// Derive macro for action enums.
///
/// Generates:
/// - `is_command()` - true if the variant is tagged `#[command]`
/// - `is_event()` - true if the variant is tagged `#[event]`
/// - `name()` - the variant name, used for structured log fields
///
/// # Panics
///
/// Produces a compile error (not a runtime panic) if applied to a non-enum
/// type or if a variant carries both `#[command]` and `#[event]`.
#[proc_macro_derive(Action, attributes(command, event))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new_spanned(input, "#[derive(Action)] can only be used on enums")
            .to_compile_error()
            .into();
    };

    let mut command_arms = Vec::new();
    let mut event_arms = Vec::new();
    let mut name_arms = Vec::new();

    for variant in &data_enum.variants {
        let ident = &variant.ident;
        let is_command = has_attribute(&variant.attrs, "command");
        let is_event = has_attribute(&variant.attrs, "event");

        if is_command && is_event {
            return syn::Error::new_spanned(
                variant,
                "Variant cannot be both #[command] and #[event]",
            )
            .to_compile_error()
            .into();
        }

        let pattern = match &variant.fields {
            Fields::Named(_) => quote! { Self::#ident { .. } },
            Fields::Unnamed(_) => quote! { Self::#ident(..) },
            Fields::Unit => quote! { Self::#ident },
        };

        if is_command {
            command_arms.push(quote! { #pattern => true, });
        }
        if is_event {
            event_arms.push(quote! { #pattern => true, });
        }

        let variant_name = ident.to_string();
        name_arms.push(quote! { #pattern => #variant_name, });
    }

    let expanded = quote! {
        impl #name {
            /// Returns true if this action is a command
            #[must_use]
            pub const fn is_command(&self) -> bool {
                match self {
                    #(#command_arms)*
                    _ => false,
                }
            }

            /// Returns true if this action is an event
            #[must_use]
            pub const fn is_event(&self) -> bool {
                match self {
                    #(#event_arms)*
                    _ => false,
                }
            }

            /// Returns the variant name for structured logging
            #[must_use]
            pub const fn name(&self) -> &'static str {
                match self {
                    #(#name_arms)*
                }
            }
        }
    };

    TokenStream::from(expanded)
}

/// Derive macro for persisted state structs.
///
/// For the field tagged `#[version]` (an `Option<Version>`), generates:
/// - `version()` - the version the state was loaded at, if persisted
/// - `set_version(version)` - stamp the state after a successful save
///
/// # Panics
///
/// Produces a compile error (not a runtime panic) if applied to a non-struct
/// type.
#[proc_macro_derive(State, attributes(version))]
pub fn derive_state(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let Data::Struct(data_struct) = &input.data else {
        return syn::Error::new_spanned(input, "#[derive(State)] can only be used on structs")
            .to_compile_error()
            .into();
    };

    let version_field = data_struct
        .fields
        .iter()
        .find(|field| has_attribute(&field.attrs, "version"))
        .and_then(|field| field.ident.as_ref());

    let version_impl = version_field.map_or_else(
        || quote! {},
        |field_name| {
            quote! {
                impl #name {
                    /// Get the persisted version of this state
                    #[must_use]
                    pub const fn version(&self) -> Option<payouts_core::version::Version> {
                        self.#field_name
                    }

                    /// Set the persisted version of this state
                    pub fn set_version(&mut self, version: payouts_core::version::Version) {
                        self.#field_name = Some(version);
                    }
                }
            }
        },
    );

    TokenStream::from(version_impl)
}

/// Helper to check whether an attribute list contains a specific attribute.
fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}
