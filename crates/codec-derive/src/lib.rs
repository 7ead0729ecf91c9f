//! `#[derive(Record)]`: the compile-time reflection step the record runtime relies on.
//!
//! Generates, once per annotated struct:
//! - an `impl codec_core::record::Record`, whose `record_schema()` builds (and caches
//!   behind a `OnceLock`) the field descriptor table the record handler drives
//!   construction/inspection through;
//! - an `impl codec_core::types::HasTypeExpr`, so the struct can appear as a nested
//!   field type (`TypeExpr::Record(schema)`) the same way a `Vec<T>` or `Option<T>` can;
//! - `Serialize`/`Deserialize` impls, via a private "shadow" struct carrying the wire
//!   aliases and omitting computed fields, rather than stacking `#[derive(Serialize,
//!   Deserialize)]` directly (a derive macro cannot itself add derives to the item it's
//!   attached to).
//!
//! Field attributes (`#[record(...)]`):
//! - `alias = "..."` — override the wire name (default: lower-camel-case of the field name).
//! - `computed` — excluded from the wire form entirely; never a constructor parameter.
//! - `cached` — informational only at this layer (interior-mutability caching is a
//!   concern for the computed field's own accessor, not the schema).
//! - `kw_only` — informational only at the handler level (constructor-call-site concern).
//! - `required` — forces the field into the required set even though it has a default.
//!
//! Struct attributes (`#[record(...)]`, repeatable):
//! - `dependent(a, b, c)` — a dependent field-name group.
//! - `disjoint(a, b)` — a disjoint field-name group.
//!
//! A field named with `#[serde(flatten)]` and type `HashMap<String, serde_json::Value>`
//! is treated as the record's extras bag: carried through `roundtrip` extras mode,
//! excluded from `fields`, and backing `Record::extras`.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, Type};

struct FieldPlan {
    ident: Ident,
    ty: Type,
    alias: String,
    computed: bool,
    cached: bool,
    kw_only: bool,
    required: bool,
    is_extras: bool,
}

#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident.clone();

    let Data::Struct(data) = &input.data else {
        return syn::Error::new(Span::call_site(), "#[derive(Record)] only supports structs")
            .to_compile_error()
            .into();
    };
    let Fields::Named(named) = &data.fields else {
        return syn::Error::new(Span::call_site(), "#[derive(Record)] requires named fields")
            .to_compile_error()
            .into();
    };

    let (dependent_groups, disjoint_groups) = match parse_struct_groups(&input.attrs) {
        Ok(groups) => groups,
        Err(err) => return err.to_compile_error().into(),
    };

    let mut plans = Vec::new();
    for field in &named.named {
        let ident = field.ident.clone().expect("named field");
        match parse_field_plan(ident, field.ty.clone(), &field.attrs) {
            Ok(plan) => plans.push(plan),
            Err(err) => return err.to_compile_error().into(),
        }
    }

    let schema_impl = build_schema_impl(&name, &plans, &dependent_groups, &disjoint_groups);
    let type_expr_impl = build_type_expr_impl(&name);
    let serde_impl = build_serde_impl(&name, &plans);

    let expanded = quote! {
        #schema_impl
        #type_expr_impl
        #serde_impl
    };
    expanded.into()
}

fn parse_struct_groups(attrs: &[syn::Attribute]) -> syn::Result<(Vec<Vec<String>>, Vec<Vec<String>>)> {
    let mut dependent = Vec::new();
    let mut disjoint = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("dependent") {
                dependent.push(parse_name_list(&meta)?);
                Ok(())
            } else if meta.path.is_ident("disjoint") {
                disjoint.push(parse_name_list(&meta)?);
                Ok(())
            } else {
                Err(meta.error("unrecognized #[record(...)] struct attribute"))
            }
        })?;
    }
    Ok((dependent, disjoint))
}

fn parse_name_list(meta: &syn::meta::ParseNestedMeta) -> syn::Result<Vec<String>> {
    let content;
    syn::parenthesized!(content in meta.input);
    let idents = content.parse_terminated(Ident::parse, syn::Token![,])?;
    Ok(idents.into_iter().map(|i| i.to_string()).collect())
}

fn parse_field_plan(ident: Ident, ty: Type, attrs: &[syn::Attribute]) -> syn::Result<FieldPlan> {
    let mut alias = to_lower_camel_case(&ident.to_string());
    let mut computed = false;
    let mut cached = false;
    let mut kw_only = false;
    let mut required = false;
    let mut is_extras = false;

    for attr in attrs {
        if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("flatten") {
                    is_extras = true;
                }
                // Other serde attributes (rename, skip, ...) are the field owner's
                // business; this macro only cares about `flatten`.
                let _ = meta.input.parse::<proc_macro2::TokenStream>();
                Ok(())
            })
            .ok();
            continue;
        }
        if !attr.path().is_ident("record") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("alias") {
                let value = meta.value()?;
                let lit: syn::LitStr = value.parse()?;
                alias = lit.value();
                Ok(())
            } else if meta.path.is_ident("computed") {
                computed = true;
                Ok(())
            } else if meta.path.is_ident("cached") {
                cached = true;
                Ok(())
            } else if meta.path.is_ident("kw_only") {
                kw_only = true;
                Ok(())
            } else if meta.path.is_ident("required") {
                required = true;
                Ok(())
            } else {
                Err(meta.error("unrecognized #[record(...)] field attribute"))
            }
        })?;
    }

    Ok(FieldPlan { ident, ty, alias, computed, cached, kw_only, required, is_extras })
}

/// `street_name` -> `streetName`; a field already without underscores passes through.
fn to_lower_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upcase_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upcase_next = true;
            continue;
        }
        if upcase_next {
            out.extend(ch.to_uppercase());
            upcase_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn build_schema_impl(
    name: &Ident,
    plans: &[FieldPlan],
    dependent_groups: &[Vec<String>],
    disjoint_groups: &[Vec<String>],
) -> TokenStream2 {
    let extras_field = plans.iter().find(|p| p.is_extras).map(|p| p.ident.clone());

    let field_entries = plans.iter().filter(|p| !p.is_extras).map(|plan| {
        let field_name = plan.ident.to_string();
        let alias = &plan.alias;
        let ty = &plan.ty;
        let computed = plan.computed;
        let cached = plan.cached;
        let kw_only = plan.kw_only;

        let constraints_expr = if plan.required {
            quote! {
                {
                    let mut c = ::codec_core::Constraints::empty();
                    c.insert(::codec_core::Constraint::Required(true));
                    c
                }
            }
        } else {
            quote! { ::codec_core::Constraints::empty() }
        };

        // A field forced `required` never needs a sampled fallback, and may not even
        // implement `Default` (e.g. a nested record with no sensible zero value).
        let default_expr = if computed || plan.required {
            quote! { None }
        } else {
            quote! {
                {
                    let sample: #ty = ::std::default::Default::default();
                    ::serde_json::to_value(&sample).ok()
                }
            }
        };

        quote! {
            fields.push(::codec_core::FieldDescriptor {
                name: #field_name,
                alias: #alias.to_string(),
                type_expr: <#ty as ::codec_core::HasTypeExpr>::type_expr(),
                constraints: #constraints_expr,
                default: #default_expr,
                has_default_factory: false,
                is_computed: #computed,
                is_cached: #cached,
                kw_only: #kw_only,
            });
        }
    });

    let allow_extras = extras_field.is_some();
    let dependent_literal = string_group_literal(dependent_groups);
    let disjoint_literal = string_group_literal(disjoint_groups);
    let name_str = name.to_string();

    let extras_impl = if let Some(field) = &extras_field {
        quote! {
            fn extras(&self) -> ::std::collections::HashMap<String, ::serde_json::Value> {
                self.#field.clone()
            }
        }
    } else {
        quote! {}
    };

    quote! {
        impl ::codec_core::Record for #name {
            fn record_schema() -> ::std::sync::Arc<::codec_core::RecordSchema> {
                static SCHEMA: ::std::sync::OnceLock<::std::sync::Arc<::codec_core::RecordSchema>> = ::std::sync::OnceLock::new();
                SCHEMA
                    .get_or_init(|| {
                        let mut fields = Vec::new();
                        #(#field_entries)*
                        let dependent_groups = ::codec_core::record::merge_dependent_groups(&#dependent_literal);
                        ::std::sync::Arc::new(::codec_core::RecordSchema {
                            name: #name_str,
                            fields,
                            constraints: ::codec_core::Constraints::empty(),
                            dependent_groups,
                            disjoint_groups: #disjoint_literal,
                            allow_extras: #allow_extras,
                        })
                    })
                    .clone()
            }

            #extras_impl
        }
    }
}

fn string_group_literal(groups: &[Vec<String>]) -> TokenStream2 {
    let groups = groups.iter().map(|group| {
        let names = group.iter();
        quote! { vec![#(#names.to_string()),*] }
    });
    quote! { vec![#(#groups),*] }
}

fn build_type_expr_impl(name: &Ident) -> TokenStream2 {
    quote! {
        impl ::codec_core::HasTypeExpr for #name {
            fn type_expr() -> ::codec_core::TypeExpr {
                ::codec_core::TypeExpr::Record(<#name as ::codec_core::Record>::record_schema())
            }
        }
    }
}

fn build_serde_impl(name: &Ident, plans: &[FieldPlan]) -> TokenStream2 {
    let shadow_ref = format_ident!("__{}ShadowRef", name);
    let shadow_owned = format_ident!("__{}ShadowOwned", name);

    // Computed fields never appear on the wire, in either direction.
    let wire_fields: Vec<&FieldPlan> = plans.iter().filter(|p| !p.computed).collect();

    let ref_fields_struct = wire_fields.iter().map(|plan| {
        let ident = &plan.ident;
        let ty = &plan.ty;
        if plan.is_extras {
            quote! {
                #[serde(flatten)]
                #ident: &'__a #ty,
            }
        } else {
            let alias = &plan.alias;
            quote! {
                #[serde(rename = #alias)]
                #ident: &'__a #ty,
            }
        }
    });
    let ref_assignments = wire_fields.iter().map(|plan| {
        let ident = &plan.ident;
        quote! { #ident: &self.#ident, }
    });

    let owned_fields = wire_fields.iter().map(|plan| {
        let ident = &plan.ident;
        let ty = &plan.ty;
        if plan.is_extras {
            quote! {
                #[serde(flatten)]
                #ident: #ty,
            }
        } else {
            let alias = &plan.alias;
            quote! {
                #[serde(rename = #alias)]
                #ident: #ty,
            }
        }
    });

    let field_idents_non_computed: Vec<_> = wire_fields.iter().map(|p| p.ident.clone()).collect();
    let field_idents_computed: Vec<_> = plans.iter().filter(|p| p.computed).map(|p| p.ident.clone()).collect();

    quote! {
        impl ::serde::Serialize for #name {
            fn serialize<__S>(&self, serializer: __S) -> ::std::result::Result<__S::Ok, __S::Error>
            where
                __S: ::serde::Serializer,
            {
                #[derive(::serde::Serialize)]
                struct #shadow_ref<'__a> {
                    #(#ref_fields_struct)*
                }
                let shadow = #shadow_ref {
                    #(#ref_assignments)*
                };
                shadow.serialize(serializer)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for #name {
            fn deserialize<__D>(deserializer: __D) -> ::std::result::Result<Self, __D::Error>
            where
                __D: ::serde::Deserializer<'de>,
            {
                #[derive(::serde::Deserialize)]
                struct #shadow_owned {
                    #(#owned_fields)*
                }
                let shadow = #shadow_owned::deserialize(deserializer)?;
                Ok(Self {
                    #(#field_idents_non_computed: shadow.#field_idents_non_computed,)*
                    #(#field_idents_computed: ::std::default::Default::default(),)*
                })
            }
        }
    }
}
