use anyhow::Result;
use provisioning_core::CompositeJobId;
use serde_json::json;

use super::credentials_json;

pub fn run(job_id: &str) -> Result<()> {
    let job = CompositeJobId::decode(job_id)?;
    let output = json!({
        "delegate_job_id": job.delegate_job_id,
        "deployment_id": job.deployment_id,
        "credentials": credentials_json(&job.credentials, false),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
