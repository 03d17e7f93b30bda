use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestRecord {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub run: Option<RunSection>,
    #[serde(default)]
    pub result: Option<ResultSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSection {
    #[serde(default)]
    pub artifacts: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultSection {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub overall: Option<String>,
}

impl RequestRecord {
    fn artifacts(&self) -> Option<&str> {
        self.run.as_ref().and_then(|run| run.artifacts.as_deref())
    }

    fn summary(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|result| result.summary.as_deref())
    }

    fn overall(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|result| result.overall.as_deref())
    }
}

pub fn describe_request(record: &RequestRecord) -> String {
    match record.state.as_str() {
        "new" => "The request was created and Testing Farm is preparing to run it.".to_owned(),
        "queued" => "The request is queued and Testing Farm is preparing to run it.".to_owned(),
        state @ ("running" | "error" | "canceled" | "cancel-requested") => {
            let mut message = format!("The request is {state}.");
            if let Some(summary) = record.summary() {
                message.push_str(&format!(" {summary}."));
            }
            if let Some(artifacts) = record.artifacts() {
                message.push_str(&format!(" See {artifacts} for details."));
            }
            message
        }
        "complete" => {
            // Clause order (overall, summary, artifacts) is part of the
            // observable contract.
            let mut message = "The request is complete.".to_owned();
            if let Some(overall) = record.overall() {
                message.push_str(&format!(" Tests have {overall}."));
            }
            if let Some(summary) = record.summary() {
                message.push_str(&format!(" {summary}."));
            }
            if let Some(artifacts) = record.artifacts() {
                message.push_str(&format!(" See {artifacts} for details."));
            }
            message
        }
        state => format!("The request is in unknown state: {state}"),
    }
}
