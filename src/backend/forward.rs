//! Forward routes.

use crate::parser::HttpRequest;
use crate::router::Params;
use crate::server::HttpResponse;

/// Body prefix that marks a response as an internal forward. The destination
/// path follows immediately.
pub const FORWARD_SENTINEL: &str = "__FORWARD__:";

pub(crate) fn execute(request: &HttpRequest, target: &str) -> HttpResponse {
    HttpResponse::forward(&substitute_params(target, &request.params))
}

/// Replace `:name` tokens in `target` with the matched parameter values.
///
/// Tokens without a matching parameter are dropped along with their name.
pub fn substitute_params(target: &str, params: &Params) -> String {
    let mut out = String::with_capacity(target.len());
    let mut rest = target;

    while let Some(colon) = rest.find(':') {
        out.push_str(&rest[..colon]);
        let after = &rest[colon + 1..];
        let name_len = after
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();

        if name_len == 0 {
            out.push(':');
        } else if let Some(value) = params.get(&after[..name_len]) {
            out.push_str(value);
        }
        rest = &after[name_len..];
    }

    out.push_str(rest);
    out
}
