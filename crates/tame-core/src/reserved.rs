// Reserved names of the trusted runtime support API. These strings are
// wire format shared with the runtime and must not change: the `__` suffix
// family is exactly what the naming-convention rules reject in author
// code, which is why engine-generated uses of these names are always
// marked synthetic.

/// The runtime support object every rewritten operation is routed through.
pub const RUNTIME: &str = "___";

/// The imports object supplying a module's free variables.
pub const IMPORTS: &str = "IMPORTS___";

/// Local binding of the receiver keyword, synthesized at function heads.
pub const LOCAL_THIS: &str = "t___";

/// Local frozen snapshot of the implicit arguments object.
pub const LOCAL_ARGUMENTS: &str = "a___";

/// Outers broker assumed by the legacy-compat dialect.
pub const OUTERS: &str = "$v";

/// Top-level receiver binding assumed by the legacy-compat dialect.
pub const DIS: &str = "$dis";

pub const THIS: &str = "this";
pub const ARGUMENTS: &str = "arguments";

/// Prefix for scope-synthesized temporaries (`x0___`, `x1___`, ...).
pub const TEMP_PREFIX: &str = "x";

/// Names user code must not declare; masking one would let author code
/// impersonate the runtime.
pub fn is_mask_protected(name: &str) -> bool {
    matches!(
        name,
        self::RUNTIME | self::IMPORTS | self::LOCAL_THIS | self::LOCAL_ARGUMENTS | self::OUTERS
            | self::DIS
    )
}

/// The reserved suffix check applied to author-written names.
pub fn ends_reserved(name: &str) -> bool {
    name.ends_with("__")
}
