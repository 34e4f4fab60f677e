use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase};
use proc_macro2::Span;
use syn::{
    Error as SynError, ExprPath, Ident, Lit, LitStr, Result as SynResult, Token, bracketed,
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
};

/// A numeric bound: `min = 1`, `max = -2.5`.
pub struct Bound {
    pub value: f64,
    pub span: Span,
}

impl Parse for Bound {
    fn parse(input: ParseStream) -> SynResult<Self> {
        let negative: Option<Token![-]> = input.parse()?;
        let lit: Lit = input.parse()?;
        let span = lit.span();
        let magnitude = match &lit {
            Lit::Int(int) => int.base10_parse::<f64>()?,
            Lit::Float(float) => float.base10_parse::<f64>()?,
            _ => return Err(SynError::new_spanned(&lit, "Expected a numeric literal")),
        };
        let value = if negative.is_some() { -magnitude } else { magnitude };
        Ok(Bound { value, span })
    }
}

/// One option inside a field's `#[config(...)]`.
pub enum FieldArg {
    /// `name = "portName"`
    Name(LitStr),
    /// `description = "..."`
    Description(LitStr),
    /// `choices = Self::ports`
    Choices(ExprPath),
    /// `depends_on = ["port", "proto"]`
    DependsOn(Vec<LitStr>),
    /// `enumeration`
    Enumeration(Ident),
    Min(Bound),
    Max(Bound),
    /// `skip`
    Skip(Ident),
}

impl Parse for FieldArg {
    fn parse(input: ParseStream) -> SynResult<Self> {
        let kw: Ident = input.parse()?;
        let arg = match kw.to_string().as_str() {
            "enumeration" => FieldArg::Enumeration(kw),
            "skip" => FieldArg::Skip(kw),
            "name" => {
                input.parse::<Token![=]>()?;
                FieldArg::Name(input.parse()?)
            }
            "description" => {
                input.parse::<Token![=]>()?;
                FieldArg::Description(input.parse()?)
            }
            "choices" => {
                input.parse::<Token![=]>()?;
                FieldArg::Choices(input.parse()?)
            }
            "depends_on" => {
                input.parse::<Token![=]>()?;
                let content;
                bracketed!(content in input);
                let names = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
                FieldArg::DependsOn(names.into_iter().collect())
            }
            "min" => {
                input.parse::<Token![=]>()?;
                FieldArg::Min(input.parse()?)
            }
            "max" => {
                input.parse::<Token![=]>()?;
                FieldArg::Max(input.parse()?)
            }
            _ => {
                return Err(SynError::new_spanned(
                    &kw,
                    "Unknown config option, expected one of 'name', 'description', 'choices', \
                     'depends_on', 'enumeration', 'min', 'max' or 'skip'",
                ));
            }
        };
        Ok(arg)
    }
}

#[derive(Debug, Clone, Copy, strum_macros::EnumString, strum_macros::VariantNames)]
pub enum RenameRule {
    #[strum(serialize = "camelCase")]
    CamelCase,
    #[strum(serialize = "snake_case")]
    SnakeCase,
    #[strum(serialize = "kebab-case")]
    KebabCase,
    #[strum(serialize = "lowercase")]
    LowerCase,
    #[strum(serialize = "UPPERCASE")]
    UpperCase,
}

impl RenameRule {
    pub fn apply(self, field: &str) -> String {
        match self {
            RenameRule::CamelCase => field.to_lower_camel_case(),
            RenameRule::SnakeCase => field.to_snake_case(),
            RenameRule::KebabCase => field.to_kebab_case(),
            RenameRule::LowerCase => field.to_lowercase(),
            RenameRule::UpperCase => field.to_uppercase(),
        }
    }
}

/// One option inside the struct's `#[config(...)]`.
pub enum ContainerArg {
    /// `rename_all = "camelCase"`
    RenameAll(RenameRule),
}

impl Parse for ContainerArg {
    fn parse(input: ParseStream) -> SynResult<Self> {
        let kw: Ident = input.parse()?;
        if kw != "rename_all" {
            return Err(SynError::new_spanned(&kw, "Expected 'rename_all'"));
        }
        input.parse::<Token![=]>()?;

        let rule: LitStr = input.parse()?;
        let parsed = rule.value().parse::<RenameRule>().map_err(|_| {
            use strum::VariantNames;
            SynError::new_spanned(
                &rule,
                format!("Unknown rename rule, expected one of {:?}", RenameRule::VARIANTS),
            )
        })?;
        Ok(ContainerArg::RenameAll(parsed))
    }
}
