//! HTTP status code constants

macro_rules! status_codes {
    ($($name:ident $value:literal $reason:literal),* $(,)?) => {
        $(
            pub const $name: u16 = $value;
        )*

        /// Returns the canonical reason phrase for `code`, or the empty
        /// string if it is not one we know about.
        pub(crate) fn reason(code: u16) -> &'static str {
            match code {
                $($value => $reason,)*
                _ => "",
            }
        }
    }
}

status_codes! {
    OK                          200 "OK",
    CREATED                     201 "Created",
    NO_CONTENT                  204 "No Content",
    MOVED_PERMANENTLY           301 "Moved Permanently",
    NOT_MODIFIED                304 "Not Modified",
    TEMPORARY_REDIRECT          307 "Temporary Redirect",
    BAD_REQUEST                 400 "Bad Request",
    UNAUTHORIZED                401 "Unauthorized",
    FORBIDDEN                   403 "Forbidden",
    NOT_FOUND                   404 "Not Found",
    METHOD_NOT_ALLOWED          405 "Method Not Allowed",
    TEAPOT                      418 "I'm a teapot",
    INTERNAL_SERVER_ERROR       500 "Internal Server Error",
    BAD_GATEWAY                 502 "Bad Gateway",
    SERVICE_UNAVAILABLE         503 "Service Unavailable",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_phrases() {
        assert_eq!(reason(OK), "OK");
        assert_eq!(reason(NOT_FOUND), "Not Found");
        assert_eq!(reason(INTERNAL_SERVER_ERROR), "Internal Server Error");
        assert_eq!(reason(299), "");
    }
}
