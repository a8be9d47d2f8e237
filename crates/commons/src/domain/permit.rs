use std::borrow::Cow;
use std::fmt;

/// How much of one rate-limited resource a call consumes
///
/// Venues usually declare their permit sets as statics:
///
/// ```ignore
/// pub static ONE_REST_REQUEST: [PermitRequest; 1] = [PermitRequest::fixed("rest_request", 1)];
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermitRequest {
    resource: Cow<'static, str>,
    weight: u32,
}

impl PermitRequest {
    pub fn new(resource: impl Into<Cow<'static, str>>, weight: u32) -> Self {
        PermitRequest {
            resource: resource.into(),
            weight,
        }
    }

    /// Const constructor for statically declared permit sets
    pub const fn fixed(resource: &'static str, weight: u32) -> Self {
        PermitRequest {
            resource: Cow::Borrowed(resource),
            weight,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }
}

impl fmt::Display for PermitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ORDER_PERMITS: [PermitRequest; 2] = [
        PermitRequest::fixed("orders", 1),
        PermitRequest::fixed("request_weight", 5),
    ];

    #[test]
    fn test_static_and_owned_permits_compare_equal() {
        let owned = PermitRequest::new(String::from("orders"), 1);
        assert_eq!(ORDER_PERMITS[0], owned);
        assert_eq!(ORDER_PERMITS[1].resource(), "request_weight");
        assert_eq!(ORDER_PERMITS[1].weight(), 5);
        assert_eq!(ORDER_PERMITS[1].to_string(), "request_weight:5");
    }
}
