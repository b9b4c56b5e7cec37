use anyhow::Context;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use tonic::service::Interceptor;
use tonic::{Request, Status};

/// Attaches the shared secret to every outgoing call.
#[derive(Clone, Debug)]
pub struct AuthToken {
    header: AsciiMetadataKey,
    secret: AsciiMetadataValue,
}

impl AuthToken {
    pub fn new(header: &str, secret: &str) -> anyhow::Result<Self> {
        let header = AsciiMetadataKey::from_bytes(header.as_bytes())
            .with_context(|| format!("TOKEN_HEADER ({header}) is not a valid header name"))?;
        if !secret.is_ascii() {
            anyhow::bail!("SECRET_TOKEN must be printable ASCII");
        }
        let secret =
            AsciiMetadataValue::try_from(secret).context("SECRET_TOKEN must be printable ASCII")?;
        Ok(Self { header, secret })
    }
}

impl Interceptor for AuthToken {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert(self.header.clone(), self.secret.clone());
        Ok(request)
    }
}
