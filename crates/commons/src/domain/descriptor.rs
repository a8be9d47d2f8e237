use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::params::RestParams;
use super::permit::PermitRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RestMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestMethod::Get => "GET",
            RestMethod::Post => "POST",
            RestMethod::Put => "PUT",
            RestMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for RestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one REST call
///
/// `R` is the type the response body decodes into. The descriptor never
/// holds an `R`, so it is `Send + Sync` regardless of the response type.
pub struct RequestDescriptor<R> {
    method: RestMethod,
    path: Cow<'static, str>,
    params: RestParams,
    required_permits: Arc<[PermitRequest]>,
    response: PhantomData<fn() -> R>,
}

impl<R> RequestDescriptor<R> {
    pub fn new(
        method: RestMethod,
        path: impl Into<Cow<'static, str>>,
        params: RestParams,
        required_permits: impl Into<Arc<[PermitRequest]>>,
    ) -> Self {
        RequestDescriptor {
            method,
            path: path.into(),
            params,
            required_permits: required_permits.into(),
            response: PhantomData,
        }
    }

    pub fn method(&self) -> RestMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &RestParams {
        &self.params
    }

    pub fn required_permits(&self) -> &[PermitRequest] {
        &self.required_permits
    }

    pub fn response_type(&self) -> &'static str {
        std::any::type_name::<R>()
    }

    /// Reject descriptors that can only come from a broken endpoint definition
    pub fn validate(&self) -> Result<(), String> {
        if !self.path.starts_with('/') {
            return Err(format!("path must start with '/': {}", self.path));
        }
        if self.path.contains('?') {
            return Err(format!(
                "query belongs in params, not in the path: {}",
                self.path
            ));
        }
        if let Some(permit) = self.required_permits.iter().find(|p| p.weight() == 0) {
            return Err(format!("zero-weight permit for {}", permit.resource()));
        }
        Ok(())
    }
}

impl<R> Clone for RequestDescriptor<R> {
    fn clone(&self) -> Self {
        RequestDescriptor {
            method: self.method,
            path: self.path.clone(),
            params: self.params.clone(),
            required_permits: Arc::clone(&self.required_permits),
            response: PhantomData,
        }
    }
}

impl<R> fmt::Debug for RequestDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("required_permits", &self.required_permits)
            .field("response_type", &self.response_type())
            .finish()
    }
}

/// A single venue endpoint definition
///
/// Endpoints only declare data; [`crate::Actor`] does the work.
pub trait Endpoint {
    type Response: DeserializeOwned;

    fn method(&self) -> RestMethod;

    fn path(&self) -> Cow<'static, str>;

    fn params(&self) -> RestParams {
        RestParams::empty()
    }

    fn required_permits(&self) -> Vec<PermitRequest>;

    fn descriptor(&self) -> RequestDescriptor<Self::Response> {
        RequestDescriptor::new(
            self.method(),
            self.path(),
            self.params(),
            self.required_permits(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct ServerTime {
        #[allow(dead_code)]
        time: i64,
    }

    struct GetServerTime;

    impl Endpoint for GetServerTime {
        type Response = ServerTime;

        fn method(&self) -> RestMethod {
            RestMethod::Get
        }

        fn path(&self) -> Cow<'static, str> {
            Cow::Borrowed("/api/time")
        }

        fn required_permits(&self) -> Vec<PermitRequest> {
            vec![PermitRequest::fixed("rest_request", 1)]
        }
    }

    #[test]
    fn test_endpoint_descriptor() {
        let descriptor = GetServerTime.descriptor();
        assert_eq!(descriptor.method(), RestMethod::Get);
        assert_eq!(descriptor.path(), "/api/time");
        assert!(descriptor.params().is_empty());
        assert_eq!(descriptor.required_permits().len(), 1);
        assert!(descriptor.response_type().ends_with("ServerTime"));
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed() {
        let no_slash: RequestDescriptor<()> = RequestDescriptor::new(
            RestMethod::Get,
            "api/time",
            RestParams::empty(),
            Vec::<PermitRequest>::new(),
        );
        assert!(no_slash.validate().is_err());

        let inline_query: RequestDescriptor<()> = RequestDescriptor::new(
            RestMethod::Get,
            "/api/depth?symbol=BTC",
            RestParams::empty(),
            Vec::<PermitRequest>::new(),
        );
        assert!(inline_query.validate().is_err());

        let zero_weight: RequestDescriptor<()> = RequestDescriptor::new(
            RestMethod::Get,
            "/api/time",
            RestParams::empty(),
            vec![PermitRequest::fixed("rest_request", 0)],
        );
        assert!(zero_weight.validate().is_err());
    }

    #[test]
    fn test_method_serialization() {
        assert_eq!(serde_json::to_string(&RestMethod::Delete).unwrap(), "\"DELETE\"");
        assert_eq!(RestMethod::Post.to_string(), "POST");
    }
}
