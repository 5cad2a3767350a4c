//! The content-type tagging and negotiation table from `spec.md` §4.3.

use std::fmt;

/// A content-type tag an [`Endpoint`](crate::endpoint::Endpoint) declares
/// for its requests and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Protobuf(ProtobufVariant),
}

/// The gRPC framing variant for a `protobuf`-tagged endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtobufVariant {
    Grpc,
    GrpcWeb,
    GrpcWebText,
}

impl ContentType {
    /// The canonical outgoing `Content-Type` header value for this tag.
    pub fn canonical_header(self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Protobuf(ProtobufVariant::Grpc) => "application/grpc",
            ContentType::Protobuf(ProtobufVariant::GrpcWeb) => "application/grpc-web+proto",
            ContentType::Protobuf(ProtobufVariant::GrpcWebText) => {
                "application/grpc-web-text+proto"
            }
        }
    }

    /// Whether an incoming `Content-Type` header value is accepted for this
    /// tag, per the "also accepted" column of `spec.md`'s canonical table.
    pub fn accepts(self, header_value: &str) -> bool {
        let value = strip_parameters(header_value);
        match self {
            ContentType::Json => value.eq_ignore_ascii_case("application/json")
                || value.eq_ignore_ascii_case("text/json"),
            ContentType::Protobuf(ProtobufVariant::Grpc) => {
                value.eq_ignore_ascii_case("application/grpc")
                    || value.eq_ignore_ascii_case("application/grpc+proto")
            }
            ContentType::Protobuf(ProtobufVariant::GrpcWeb) => {
                value.eq_ignore_ascii_case("application/grpc-web+proto")
                    || value.eq_ignore_ascii_case("application/grpc-web")
            }
            ContentType::Protobuf(ProtobufVariant::GrpcWebText) => {
                value.eq_ignore_ascii_case("application/grpc-web-text+proto")
                    || value.eq_ignore_ascii_case("application/grpc-web-text")
            }
        }
    }
}

fn strip_parameters(header_value: &str) -> &str {
    header_value.split(';').next().unwrap_or("").trim()
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_header())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_accepts_both_canonical_and_alternate_header() {
        assert!(ContentType::Json.accepts("application/json"));
        assert!(ContentType::Json.accepts("text/json"));
        assert!(!ContentType::Json.accepts("application/xml"));
    }

    #[test]
    fn json_accepts_ignores_charset_parameter() {
        assert!(ContentType::Json.accepts("application/json; charset=utf-8"));
    }

    #[test]
    fn grpc_variants_accept_documented_alternates() {
        let grpc = ContentType::Protobuf(ProtobufVariant::Grpc);
        assert!(grpc.accepts("application/grpc"));
        assert!(grpc.accepts("application/grpc+proto"));

        let web = ContentType::Protobuf(ProtobufVariant::GrpcWeb);
        assert!(web.accepts("application/grpc-web+proto"));
        assert!(web.accepts("application/grpc-web"));

        let web_text = ContentType::Protobuf(ProtobufVariant::GrpcWebText);
        assert!(web_text.accepts("application/grpc-web-text+proto"));
        assert!(web_text.accepts("application/grpc-web-text"));
    }

    #[test]
    fn canonical_header_matches_table() {
        assert_eq!(ContentType::Json.canonical_header(), "application/json");
        assert_eq!(
            ContentType::Protobuf(ProtobufVariant::Grpc).canonical_header(),
            "application/grpc"
        );
    }
}
