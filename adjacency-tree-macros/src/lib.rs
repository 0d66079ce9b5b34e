use proc_macro::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{
    parse_macro_input, spanned::Spanned, Attribute, Data, DeriveInput, Field, Fields, Ident,
    Token, Type,
};

#[proc_macro_derive(AdjacencyTreeModel, attributes(adjacency_tree))]
pub fn derive_adjacency_tree_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_adjacency_tree_model(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct Options {
    id_field: Option<String>,
    id_type: Option<Type>,
    parent_field: Option<String>,
    table: Option<String>,
    strategy: Option<syn::LitStr>,
}

fn impl_adjacency_tree_model(input: &DeriveInput) -> syn::Result<TokenStream> {
    let struct_ident = &input.ident;

    let data_struct = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "AdjacencyTreeModel can only be derived for structs",
            ))
        }
    };

    let mut options = Options::default();
    let mut table_name: Option<String> = None;

    for attr in &input.attrs {
        if attr.path().is_ident("adjacency_tree") {
            parse_adjacency_tree_attr(attr, &mut options)?;
        }

        if attr.path().is_ident("sea_orm") {
            if let Some(name) = parse_sea_orm_key(attr, "table_name")? {
                table_name = Some(name);
            }
        }
    }

    let id_field_name = options.id_field.unwrap_or_else(|| "id".to_string());
    let parent_field_name = options
        .parent_field
        .unwrap_or_else(|| "parent_id".to_string());

    let fields = match &data_struct.fields {
        Fields::Named(fields) => &fields.named,
        _ => {
            return Err(syn::Error::new(
                data_struct.fields.span(),
                "AdjacencyTreeModel requires named fields",
            ))
        }
    };

    let find_field = |name: &str| -> syn::Result<&Field> {
        fields
            .iter()
            .find(|field| field.ident.as_ref().is_some_and(|ident| ident == name))
            .ok_or_else(|| {
                syn::Error::new(
                    struct_ident.span(),
                    format!("no field named `{name}`; set it with #[adjacency_tree(...)]"),
                )
            })
    };

    let id_field = find_field(&id_field_name)?;
    let parent_field = find_field(&parent_field_name)?;

    let id_type = options.id_type.unwrap_or_else(|| id_field.ty.clone());
    let id_column = column_name(id_field, &id_field_name)?;
    let parent_column = column_name(parent_field, &parent_field_name)?;

    let table = options
        .table
        .or(table_name)
        .unwrap_or_else(|| struct_ident.unraw().to_string());

    let id_field_ident = Ident::new(&id_field_name, struct_ident.span());
    let parent_field_ident = Ident::new(&parent_field_name, struct_ident.span());

    let parent_expr = if is_option(&parent_field.ty) {
        quote! { self.#parent_field_ident.clone() }
    } else {
        quote! { ::core::option::Option::Some(self.#parent_field_ident.clone()) }
    };

    let strategy_call = match &options.strategy {
        Some(lit) => {
            let variant = match lit.value().as_str() {
                "recursive_query" => quote! { RecursiveQuery },
                "level_by_level" => quote! { LevelByLevel },
                other => {
                    return Err(syn::Error::new(
                        lit.span(),
                        format!(
                            "Unknown strategy `{other}`; expected `recursive_query` or `level_by_level`"
                        ),
                    ))
                }
            };
            quote! { .strategy(::adjacency_tree::TraversalStrategy::#variant) }
        }
        None => quote! {},
    };

    let table_literal = syn::LitStr::new(&table, struct_ident.span());
    let id_column_literal = syn::LitStr::new(&id_column, struct_ident.span());
    let parent_column_literal = syn::LitStr::new(&parent_column, struct_ident.span());

    let generated = quote! {
        impl ::adjacency_tree::AdjacencyTreeModel for #struct_ident {
            type Id = #id_type;

            fn adjacency_tree_config() -> &'static ::adjacency_tree::TreeConfig {
                static CONFIG: ::adjacency_tree::__private::Lazy<::adjacency_tree::TreeConfig> =
                    ::adjacency_tree::__private::Lazy::new(|| {
                        ::adjacency_tree::TreeOptions::default()
                            .id_column(#id_column_literal)
                            .parent_column(#parent_column_literal)
                            #strategy_call
                            .apply(::adjacency_tree::TreeConfig::new(#table_literal))
                    });
                &CONFIG
            }

            fn id(&self) -> Self::Id {
                self.#id_field_ident.clone()
            }

            fn parent_id(&self) -> ::core::option::Option<Self::Id> {
                #parent_expr
            }
        }
    };

    Ok(generated.into())
}

fn parse_adjacency_tree_attr(attr: &Attribute, options: &mut Options) -> syn::Result<()> {
    attr.parse_nested_meta(|meta| {
        let ident = meta
            .path
            .get_ident()
            .ok_or_else(|| syn::Error::new(meta.path.span(), "Invalid option key"))?
            .to_string();

        match ident.as_str() {
            "id_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.id_field = Some(value.value());
            }
            "parent_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.parent_field = Some(value.value());
            }
            "table" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.table = Some(value.value());
            }
            "strategy" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.strategy = Some(value);
            }
            "id_type" => {
                let ty: Type = meta.value()?.parse()?;
                options.id_type = Some(ty);
            }
            other => {
                return Err(syn::Error::new(
                    meta.path.span(),
                    format!("Unsupported adjacency_tree option `{other}`"),
                ));
            }
        }

        Ok(())
    })
}

/// Reads `key = "..."` out of a `#[sea_orm(...)]` attribute, stepping over
/// every other entry.
fn parse_sea_orm_key(attr: &Attribute, key: &str) -> syn::Result<Option<String>> {
    let mut found: Option<String> = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident(key) {
            let value: syn::LitStr = meta.value()?.parse()?;
            found = Some(value.value());
            return Ok(());
        }
        skip_meta_value(&meta)
    })?;
    Ok(found)
}

fn skip_meta_value(meta: &ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta_value(&inner))?;
    }
    Ok(())
}

fn column_name(field: &Field, field_name: &str) -> syn::Result<String> {
    for attr in &field.attrs {
        if attr.path().is_ident("sea_orm") {
            if let Some(name) = parse_sea_orm_key(attr, "column_name")? {
                return Ok(name);
            }
        }
    }
    Ok(field_name.to_string())
}

fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}
