use darling::{ast, FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, GenericArgument, Ident, PathArguments, Type};

#[derive(FromDeriveInput)]
#[darling(supports(struct_named, struct_unit))]
struct InjectableInput {
    ident: Ident,
    generics: syn::Generics,
    data: ast::Data<(), InjectField>,
}

/// `#[inject(...)]` options of one constructor parameter.
#[derive(FromField)]
#[darling(attributes(inject))]
struct InjectField {
    ident: Option<Ident>,
    ty: Type,
    #[darling(default)]
    token: Option<String>,
    #[darling(default)]
    optional: bool,
    #[darling(default)]
    forward_ref: bool,
    #[darling(default)]
    repository: Option<String>,
}

/// Generated pieces of one parameter.
struct Parameter {
    design: TokenStream2,
    declared: Option<TokenStream2>,
    optional: bool,
    extract: TokenStream2,
}

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = match InjectableInput::from_derive_input(&input) {
        Ok(parsed) => generate_injectable_impl(parsed).unwrap_or_else(|e| e.to_compile_error()),
        Err(e) => e.write_errors(),
    };
    TokenStream::from(expanded)
}

fn generate_injectable_impl(input: InjectableInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match input.data {
        ast::Data::Struct(fields) => fields.fields,
        ast::Data::Enum(_) => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[derive(Injectable)] can only be applied to structs",
            ))
        }
    };

    let mut designs = Vec::new();
    let mut declarations = Vec::new();
    let mut optionals = Vec::new();
    let mut assignments = Vec::new();
    let mut module_ref_field = None;

    for (index, field) in fields.iter().enumerate() {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(&field.ty, "expected a named field"))?;
        let parameter = generate_parameter(index, field)?;

        if module_ref_field.is_none() && last_segment_is(&field.ty, "ModuleRef") {
            module_ref_field = Some(field_name.clone());
        }

        let design = parameter.design;
        designs.push(quote! { .param(#design) });
        if let Some(declared) = parameter.declared {
            declarations.push(quote! { .declare(#index, #declared) });
        }
        if parameter.optional {
            optionals.push(quote! { .optional(#index) });
        }
        let extract = parameter.extract;
        assignments.push(quote! { #field_name: #extract });
    }

    let transactional_impl = module_ref_field.map(|field_name| {
        quote! {
            impl #impl_generics ::meshestra_transactional::Transactional for #struct_name #ty_generics #where_clause {
                fn module_ref(&self) -> &::meshestra_transactional::ModuleRef {
                    &self.#field_name
                }
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::meshestra_transactional::Rebindable for #struct_name #ty_generics #where_clause {
            fn constructor_metadata() -> ::meshestra_transactional::ConstructorMetadata {
                ::meshestra_transactional::ConstructorMetadata::builder(::std::any::type_name::<Self>())
                    #(#designs)*
                    #(#declarations)*
                    #(#optionals)*
                    .build()
            }

            #[allow(unused_mut, unused_variables)]
            fn rebuild(
                mut args: ::meshestra_transactional::ConstructorArgs
            ) -> ::meshestra_transactional::Result<Self> {
                ::std::result::Result::Ok(Self {
                    #(#assignments),*
                })
            }
        }

        impl #impl_generics ::meshestra_transactional::Injectable for #struct_name #ty_generics #where_clause {
            fn inject(
                container: &::meshestra_transactional::Container
            ) -> ::meshestra_transactional::Result<Self> {
                ::meshestra_transactional::transactional::inject_rebindable::<Self>(container)
            }
        }

        #transactional_impl
    })
}

fn generate_parameter(index: usize, field: &InjectField) -> syn::Result<Parameter> {
    let (ty, wrapped_in_option) = match generic_inner(&field.ty, "Option") {
        Some(inner) => (inner, true),
        None => (&field.ty, false),
    };
    let optional = field.optional || wrapped_in_option;
    let named = |token: &str| quote! { ::meshestra_transactional::DeclaredToken::named(#token) };
    let forward = |target: &Type| {
        quote! {
            ::meshestra_transactional::DeclaredToken::forward(|| ::meshestra_transactional::Token::of::<#target>())
        }
    };
    let value = if wrapped_in_option {
        quote! { args.optional_value::<#ty>(#index)? }
    } else {
        quote! { args.value::<#ty>(#index)? }
    };

    // Repository<E>, or any repository type: bound to the transaction when rebinding.
    if let Some(entity) = &field.repository {
        let token = field
            .token
            .clone()
            .unwrap_or_else(|| format!("{}Repository", entity));
        return Ok(Parameter {
            design: quote! { ::meshestra_transactional::DesignType::repository::<#ty>() },
            declared: Some(named(&token)),
            optional,
            extract: value,
        });
    }

    // Lazy<T> always resolves through a forward reference unless a token is given.
    if let Some(inner) = generic_inner(ty, "Lazy") {
        if wrapped_in_option {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "Option<Lazy<_>> is not supported, use #[inject(optional)] with Option<Arc<_>>",
            ));
        }
        let declared = match &field.token {
            Some(token) => named(token),
            None => forward(inner),
        };
        return Ok(Parameter {
            design: quote! { ::meshestra_transactional::DesignType::class::<#inner>() },
            declared: Some(declared),
            optional,
            extract: quote! { args.lazy::<#inner>(#index)? },
        });
    }

    let (design_target, extract) = match generic_inner(ty, "Arc") {
        // Arc<dyn Trait> is registered as a cloned Arc<dyn Trait> value
        Some(inner @ Type::TraitObject(_)) => (inner, value),
        Some(inner) if wrapped_in_option => (inner, quote! { args.optional::<#inner>(#index)? }),
        Some(inner) => (inner, quote! { args.instance::<#inner>(#index)? }),
        None => (ty, value),
    };

    let declared = match (&field.token, field.forward_ref) {
        (Some(token), _) => Some(named(token)),
        (None, true) => Some(forward(design_target)),
        (None, false) => None,
    };

    Ok(Parameter {
        design: quote! { ::meshestra_transactional::DesignType::class::<#design_target>() },
        declared,
        optional,
        extract,
    })
}

/// The single generic argument of `Wrapper<T>` when `ty` is such a type.
fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first()? {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

fn last_segment_is(ty: &Type, name: &str) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == name),
        _ => false,
    }
}
