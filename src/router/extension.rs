//! Extension-based backend selection, used when no route matches.

use crate::router::table::RouteType;

const EXTENSIONS: &[(&str, RouteType)] = &[
    (".lua", RouteType::Lua),
    (".py", RouteType::Python),
    (".php", RouteType::Php),
    (".js", RouteType::Node),
    (".rhai", RouteType::Rhai),
    (".db", RouteType::Sqlite),
    (".cmod", RouteType::Cmod),
];

/// The extension of the last path segment, dot included.
pub fn extension_of(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    segment.rfind('.').map(|dot| &segment[dot..])
}

/// Exact, case-sensitive extension lookup. `None` means static.
pub fn lookup_extension(path: &str) -> Option<RouteType> {
    let ext = extension_of(path)?;
    EXTENSIONS
        .iter()
        .find_map(|(known, route_type)| (*known == ext).then_some(*route_type))
}
