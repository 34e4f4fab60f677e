use std::collections::HashSet;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DeriveInput, Error as SynError, ExprPath, Fields, Ident, LitStr, Result as SynResult,
    Token, Type, parse_macro_input, punctuated::Punctuated,
};

extern crate proc_macro;

mod model;

use model::{Bound, ContainerArg, FieldArg, RenameRule};

/// One configurable field after option processing.
struct Attribute {
    ident: Ident,
    ty: Type,
    name: String,
    description: Option<LitStr>,
    choices: Option<ExprPath>,
    depends_on: Vec<LitStr>,
    enumeration: bool,
    min: Option<Bound>,
    max: Option<Bound>,
}

impl Attribute {
    fn has_choices(&self) -> bool {
        self.choices.is_some() || self.enumeration
    }

    fn spec(&self) -> TokenStream2 {
        let name = &self.name;
        let ty = &self.ty;
        let kind = if self.enumeration {
            quote! { ::ardulink::config::AttributeKind::Enumeration }
        } else {
            quote! { <#ty as ::ardulink::config::ConfigField>::KIND }
        };
        let description = match &self.description {
            Some(text) => quote! { ::core::option::Option::Some(#text) },
            None => quote! { ::core::option::Option::None },
        };
        let depends_on = &self.depends_on;
        let has_choices = self.has_choices();
        let min = bound_tokens(self.min.as_ref());
        let max = bound_tokens(self.max.as_ref());

        quote! {
            ::ardulink::config::AttributeSpec {
                name: #name,
                kind: #kind,
                description: #description,
                depends_on: &[#(#depends_on),*],
                has_choices: #has_choices,
                min: #min,
                max: #max,
            }
        }
    }

    fn getter(&self) -> TokenStream2 {
        let ident = &self.ident;
        if self.enumeration {
            quote! { ::core::option::Option::Some(::ardulink::config::enum_value(&self.#ident)) }
        } else {
            quote! { ::ardulink::config::ConfigField::to_config_value(&self.#ident) }
        }
    }

    fn setter(&self) -> TokenStream2 {
        let ident = &self.ident;
        let ty = &self.ty;
        let name = &self.name;
        if self.enumeration {
            quote! { self.#ident = ::ardulink::config::enum_from_value::<#ty>(#name, value)?; }
        } else {
            quote! {
                self.#ident = <#ty as ::ardulink::config::ConfigField>::from_config_value(value)
                    .map_err(|reason| ::ardulink::error::ConfigurationError::InvalidValue {
                        attribute: #name.to_string(),
                        reason,
                    })?;
            }
        }
    }

    fn choices(&self) -> Option<TokenStream2> {
        let ty = &self.ty;
        match (&self.choices, self.enumeration) {
            (Some(provider), _) => Some(quote! {
                #provider(self)
                    .into_iter()
                    .map(::core::convert::Into::<::ardulink::config::ConfigValue>::into)
                    .collect()
            }),
            (None, true) => Some(quote! { ::ardulink::config::enum_choices::<#ty>() }),
            (None, false) => None,
        }
    }
}

fn bound_tokens(bound: Option<&Bound>) -> TokenStream2 {
    match bound {
        Some(Bound { value, .. }) => quote! { ::core::option::Option::Some(#value) },
        None => quote! { ::core::option::Option::None },
    }
}

fn config_args<T: syn::parse::Parse>(attrs: &[syn::Attribute]) -> SynResult<Vec<T>> {
    let mut args = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("config")) {
        let parsed = attr.parse_args_with(Punctuated::<T, Token![,]>::parse_terminated)?;
        args.extend(parsed);
    }
    Ok(args)
}

fn parse_attribute(field: &syn::Field, rename: Option<RenameRule>) -> SynResult<Option<Attribute>> {
    let Some(ident) = field.ident.clone() else {
        return Err(SynError::new_spanned(field, "LinkConfig fields must be named"));
    };

    let mut attribute = Attribute {
        name: match rename {
            Some(rule) => rule.apply(&ident.to_string()),
            None => ident.to_string(),
        },
        ident,
        ty: field.ty.clone(),
        description: None,
        choices: None,
        depends_on: Vec::new(),
        enumeration: false,
        min: None,
        max: None,
    };

    for arg in config_args::<FieldArg>(&field.attrs)? {
        match arg {
            FieldArg::Skip(_) => return Ok(None),
            FieldArg::Name(name) => attribute.name = name.value(),
            FieldArg::Description(text) => attribute.description = Some(text),
            FieldArg::Choices(provider) => attribute.choices = Some(provider),
            FieldArg::DependsOn(names) => attribute.depends_on = names,
            FieldArg::Enumeration(_) => attribute.enumeration = true,
            FieldArg::Min(bound) => attribute.min = Some(bound),
            FieldArg::Max(bound) => attribute.max = Some(bound),
        }
    }

    if attribute.choices.is_none() {
        if let Some(first) = attribute.depends_on.first() {
            return Err(SynError::new_spanned(
                first,
                "'depends_on' requires a 'choices' provider on the same field",
            ));
        }
    }
    if let (Some(min), Some(max)) = (&attribute.min, &attribute.max) {
        if min.value > max.value {
            return Err(SynError::new(max.span, "'max' must not be smaller than 'min'"));
        }
    }

    Ok(Some(attribute))
}

fn expand(input: DeriveInput) -> SynResult<TokenStream2> {
    let ident = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(SynError::new_spanned(
            &input.generics,
            "LinkConfig cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(SynError::new_spanned(
                    ident,
                    "LinkConfig can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(SynError::new_spanned(
                ident,
                "LinkConfig can only be derived for structs",
            ));
        }
    };

    let mut rename = None;
    for arg in config_args::<ContainerArg>(&input.attrs)? {
        match arg {
            ContainerArg::RenameAll(rule) => rename = Some(rule),
        }
    }

    let mut attributes = Vec::new();
    for field in fields {
        if let Some(attribute) = parse_attribute(field, rename)? {
            attributes.push(attribute);
        }
    }

    let mut seen = HashSet::new();
    for attribute in &attributes {
        if !seen.insert(attribute.name.as_str()) {
            return Err(SynError::new_spanned(
                &attribute.ident,
                format!("Duplicate attribute name '{}'", attribute.name),
            ));
        }
    }
    for attribute in &attributes {
        let unknown = attribute
            .depends_on
            .iter()
            .find(|d| !seen.contains(d.value().as_str()));
        if let Some(unknown) = unknown {
            return Err(SynError::new_spanned(
                unknown,
                format!("'{}' is not an attribute of {ident}", unknown.value()),
            ));
        }
    }

    let specs = attributes.iter().map(Attribute::spec);
    let names: Vec<&str> = attributes.iter().map(|a| a.name.as_str()).collect();
    let getters = attributes.iter().map(Attribute::getter);
    let setters = attributes.iter().map(Attribute::setter);
    let (choice_names, choice_bodies): (Vec<&str>, Vec<TokenStream2>) = attributes
        .iter()
        .filter_map(|a| a.choices().map(|body| (a.name.as_str(), body)))
        .unzip();

    Ok(quote! {
        impl ::ardulink::config::LinkConfig for #ident {
            fn attributes() -> &'static [::ardulink::config::AttributeSpec] {
                const ATTRIBUTES: &[::ardulink::config::AttributeSpec] = &[#(#specs),*];
                ATTRIBUTES
            }

            fn value(&self, name: &str) -> ::core::option::Option<::ardulink::config::ConfigValue> {
                match name {
                    #(#names => #getters,)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn set_value(
                &mut self,
                name: &str,
                value: ::core::option::Option<::ardulink::config::ConfigValue>,
            ) -> ::core::result::Result<(), ::ardulink::error::ConfigurationError> {
                match name {
                    #(#names => {
                        #setters
                        ::core::result::Result::Ok(())
                    })*
                    _ => ::core::result::Result::Err(
                        ::ardulink::error::ConfigurationError::UnknownAttribute {
                            attribute: name.to_string(),
                            available: ::std::vec![#(#names.to_string()),*],
                        },
                    ),
                }
            }

            fn choices(
                &self,
                name: &str,
            ) -> ::core::option::Option<::std::vec::Vec<::ardulink::config::ConfigValue>> {
                match name {
                    #(#choice_names => ::core::option::Option::Some(#choice_bodies),)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

/// Derives `ardulink::config::LinkConfig` for a struct with named fields.
///
/// Field options, inside `#[config(...)]`:
/// - `name = "..."`: attribute name (defaults to the field name)
/// - `description = "..."`
/// - `choices = path`: a `fn(&Self) -> Vec<impl Into<ConfigValue>>`
/// - `depends_on = ["other", ...]`: the choice list is recomputed on every read
/// - `enumeration`: the field is a strum enum (`AsRefStr`, `EnumString`, `VariantNames`)
/// - `min = N`, `max = N`: bounds reported as validation info
/// - `skip`
///
/// Container option: `rename_all = "..."`, one of `camelCase`, `snake_case`,
/// `kebab-case`, `lowercase` or `UPPERCASE`.
#[proc_macro_derive(LinkConfig, attributes(config))]
pub fn derive_link_config(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(SynError::into_compile_error)
        .into()
}
