mod model;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Model)]
// ============================================================================

/// Derive macro implementing `polystore::Model` from a struct's fields.
///
/// # Usage
///
/// ```ignore
/// #[derive(Model, Serialize, Deserialize, Clone)]
/// #[model(kind = "Person", adapter = "inmemory")]
/// pub struct Person {
///     pub id: Option<i64>,
///     pub firstname: Option<String>,
///     #[model(required)]
///     pub lastname: String,
///     #[model(choices("admin", "user"), default = "user")]
///     pub role: Option<String>,
///     pub tags: Vec<String>,
///     #[model(nested)]
///     pub address: Option<Address>,
///     #[model(unindexed)]
///     pub bio: Option<String>,
/// }
/// ```
///
/// Struct attributes:
/// - `kind = "..."` sets the kind name. Defaults to the struct name.
/// - `adapter = "..."` pins the kind to a registered adapter.
///
/// Field attributes:
/// - `id` marks the field carrying the key id. Defaults to a field named `id`.
/// - `required`, `unindexed` (or `indexed = false`), `default = expr`,
///   `choices(expr, ..)` set the property policy.
/// - `nested` stores a struct that itself derives `Model` as a nested record.
/// - `skip` (or `#[serde(skip)]`) leaves the field out of the schema.
///
/// The property type is inferred from the field type: `String`, integers,
/// floats, `bool`, chrono's `NaiveDate`/`NaiveTime`/`NaiveDateTime`, and
/// `Key`. `Option<T>` is optional; `Vec<T>` is a repeated property.
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    model::derive_model(input)
}
