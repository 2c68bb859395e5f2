use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::punctuated::Punctuated;
use syn::{
    Data, DeriveInput, Expr, Field, Fields, GenericArgument, LitStr, PathArguments, Token, Type,
};

pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (kind, adapter) = parse_struct_attrs(input)?;

    let fields = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Model derive only supports structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "Model derive only supports structs")),
    };

    let mut id_field: Option<String> = None;
    let mut properties = Vec::new();
    for field in fields {
        let attrs = FieldAttrs::parse(field)?;
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;

        if attrs.skip || has_serde_skip(&field.attrs) {
            continue;
        }
        if attrs.id {
            id_field = Some(ident.to_string());
            continue;
        }
        properties.push(property_tokens(&ident.to_string(), field, &attrs)?);
    }

    // Default: a field named `id` carries the key id.
    if id_field.is_none() && properties.iter().any(|(field, _)| field == "id") {
        properties.retain(|(field, _)| field != "id");
        id_field = Some("id".to_string());
    }

    let id_field = match id_field {
        Some(field) => quote! { ::std::option::Option::Some(#field) },
        None => quote! { ::std::option::Option::None },
    };
    let properties = properties.into_iter().map(|(_, tokens)| tokens);
    let adapter = adapter.map(|adapter| quote! { .adapter(#adapter) });

    Ok(quote! {
        impl ::polystore::Model for #name {
            const KIND: &'static str = #kind;
            const ID_FIELD: ::std::option::Option<&'static str> = #id_field;

            fn schema() -> ::polystore::Schema {
                ::polystore::Schema::new(#kind)
                    #(.property(#properties))*
                    #adapter
            }
        }
    })
}

fn parse_struct_attrs(input: &DeriveInput) -> syn::Result<(String, Option<String>)> {
    let mut kind = input.ident.to_string();
    let mut adapter = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("model") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("kind") {
                let value: LitStr = meta.value()?.parse()?;
                kind = value.value();
            } else if meta.path.is_ident("adapter") {
                let value: LitStr = meta.value()?.parse()?;
                adapter = Some(value.value());
            } else {
                return Err(meta.error("expected `kind` or `adapter`"));
            }
            Ok(())
        })?;
    }
    Ok((kind, adapter))
}

#[derive(Default)]
struct FieldAttrs {
    id: bool,
    skip: bool,
    required: bool,
    indexed: Option<bool>,
    nested: bool,
    choices: Vec<Expr>,
    default: Option<Expr>,
}

impl FieldAttrs {
    fn parse(field: &Field) -> syn::Result<Self> {
        let mut attrs = FieldAttrs::default();
        for attr in &field.attrs {
            if !attr.path().is_ident("model") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    attrs.id = true;
                } else if meta.path.is_ident("skip") {
                    attrs.skip = true;
                } else if meta.path.is_ident("required") {
                    attrs.required = true;
                } else if meta.path.is_ident("unindexed") {
                    attrs.indexed = Some(false);
                } else if meta.path.is_ident("indexed") {
                    attrs.indexed = Some(if meta.input.peek(Token![=]) {
                        meta.value()?.parse::<syn::LitBool>()?.value
                    } else {
                        true
                    });
                } else if meta.path.is_ident("nested") {
                    attrs.nested = true;
                } else if meta.path.is_ident("choices") {
                    let content;
                    syn::parenthesized!(content in meta.input);
                    let choices = Punctuated::<Expr, Token![,]>::parse_terminated(&content)?;
                    attrs.choices = choices.into_iter().collect();
                } else if meta.path.is_ident("default") {
                    attrs.default = Some(meta.value()?.parse()?);
                } else {
                    return Err(meta.error(
                        "expected one of `id`, `skip`, `required`, `indexed`, `unindexed`, `nested`, `choices`, `default`",
                    ));
                }
                Ok(())
            })?;
        }
        Ok(attrs)
    }
}

fn property_tokens(
    name: &str,
    field: &Field,
    attrs: &FieldAttrs,
) -> syn::Result<(String, TokenStream2)> {
    let (inner, repeated) = unwrap_field_type(&field.ty);
    let basetype = basetype_tokens(inner, attrs.nested)?;

    let mut tokens = quote! { ::polystore::Property::new(#name, #basetype) };
    if attrs.required {
        tokens.extend(quote! { .required() });
    }
    if repeated {
        tokens.extend(quote! { .repeated() });
    }
    if attrs.indexed == Some(false) {
        tokens.extend(quote! { .unindexed() });
    }
    if let Some(default) = &attrs.default {
        tokens.extend(quote! { .default_value(#default) });
    }
    if !attrs.choices.is_empty() {
        let choices = &attrs.choices;
        tokens.extend(quote! { .choices([#(#choices),*]) });
    }
    Ok((name.to_string(), tokens))
}

/// Strip `Option<..>` and detect `Vec<..>` (a repeated property).
fn unwrap_field_type(ty: &Type) -> (&Type, bool) {
    let ty = generic_inner(ty, "Option").unwrap_or(ty);
    match generic_inner(ty, "Vec") {
        Some(inner) => (generic_inner(inner, "Option").unwrap_or(inner), true),
        None => (ty, false),
    }
}

fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn basetype_tokens(ty: &Type, nested: bool) -> syn::Result<TokenStream2> {
    if nested {
        return Ok(quote! {
            ::polystore::BaseType::Nested(::std::sync::Arc::new(
                <#ty as ::polystore::Model>::schema()
            ))
        });
    }

    let ident = match ty {
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        Type::Reference(reference) => Some(reference.elem.to_token_stream().to_string()),
        _ => None,
    };
    let basetype = match ident.as_deref() {
        Some("String" | "str") => quote! { String },
        Some(
            "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize",
        ) => quote! { Int },
        Some("f32" | "f64") => quote! { Float },
        Some("bool") => quote! { Bool },
        Some("NaiveDate") => quote! { Date },
        Some("NaiveTime") => quote! { Time },
        Some("NaiveDateTime") => quote! { DateTime },
        Some("Key") => quote! { Key },
        _ => {
            return Err(syn::Error::new_spanned(
                ty,
                "cannot infer a property type; mark the field #[model(nested)] or #[model(skip)]",
            ))
        }
    };
    Ok(quote! { ::polystore::BaseType::#basetype })
}

fn has_serde_skip(attrs: &[syn::Attribute]) -> bool {
    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        let mut found_skip = false;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                found_skip = true;
            } else if meta.input.peek(Token![=]) {
                meta.value()?.parse::<Expr>()?;
            }
            Ok(())
        });

        if found_skip {
            return true;
        }
    }
    false
}
