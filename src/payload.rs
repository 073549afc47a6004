use serde::Deserialize;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Malformed,
}

/// The venus-os MQTT envelope, `{"value": 12.5}` or `{"value": null}`
#[derive(Deserialize)]
struct Envelope {
    value: Option<f32>,
}

/// Extracts the numeric value from a telemetry payload.
///
/// `Ok(None)` means the gateway reports the value as unavailable, this
/// includes an empty payload (a cleared retained message). Bare numbers
/// are accepted as well for brokers that republish plain values.
pub fn parse_value(payload: &[u8]) -> Result<Option<f32>, Error> {
    let payload = payload.trim_ascii();
    if payload.is_empty() {
        return Ok(None);
    }

    if payload[0] == b'{' {
        let (envelope, _) =
            serde_json_core::from_slice::<Envelope>(payload).map_err(|_| Error::Malformed)?;
        return Ok(envelope.value.filter(|v| v.is_finite()));
    }

    let (value, _) = serde_json_core::from_slice::<f32>(payload).map_err(|_| Error::Malformed)?;
    Ok(Some(value).filter(|v| v.is_finite()))
}
