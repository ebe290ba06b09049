use serde::Serialize;
use tera::{Context as TeraContext, Tera};

use super::RunReport;

pub trait ReportEngine {
    type Error: std::error::Error + Sync + Send + 'static;

    fn render_report(&self, report: &RunReport<'_>) -> Result<String, Self::Error>;
}

#[derive(Debug, Serialize)]
struct ReportLine<'a> {
    label: &'a str,
    detail: &'a str,
}

pub struct TeraReportEngine {
    tera: Tera,
}

impl TeraReportEngine {
    pub fn try_init() -> Result<Self, tera::Error> {
        Ok(Self {
            tera: Self::get_tera_template()?,
        })
    }

    pub fn get_tera_template() -> Result<Tera, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (
                "report.html",
                r###"
<h2>{{ title }} Report</h2>
<p>The {{ title | lower }} process has completed.</p>
<p><strong>Summary:</strong></p>
<ul>
  <li>Total: {{ total }}</li>
  <li>Successful: {{ success_count }}</li>
  <li>Failed: {{ failure_count }}</li>
</ul>
{%- if successes | length > 0 %}
<h3>Successful:</h3>
<ul>
  {%- for line in successes %}
  {% include "line.html" %}
  {%- endfor %}
</ul>
{%- endif %}
{%- if failures | length > 0 %}
<h3>Failed:</h3>
<ul>
  {%- for line in failures %}
  {% include "line.html" %}
  {%- endfor %}
</ul>
{%- endif %}
"###,
            ),
            ("line.html", r###"<li>{{ line.label }}: {{ line.detail }}</li>"###),
        ])?;
        Ok(tera)
    }
}

impl ReportEngine for TeraReportEngine {
    type Error = tera::Error;

    #[tracing::instrument(level = "debug", skip(self, report), fields(title = report.title))]
    fn render_report(&self, report: &RunReport<'_>) -> Result<String, Self::Error> {
        let summary = &report.summary;
        let successes = summary
            .successes()
            .iter()
            .map(|record| ReportLine {
                label: record.source_item.identifier(),
                detail: &record.identifier,
            })
            .collect::<Vec<_>>();
        let failures = summary
            .failures()
            .iter()
            .map(|record| ReportLine {
                label: &record.identifier,
                detail: record.error_message().unwrap_or_default(),
            })
            .collect::<Vec<_>>();

        let mut tera_context = TeraContext::new();
        tera_context.insert("title", report.title);
        tera_context.insert("total", &summary.total());
        tera_context.insert("success_count", &summary.success_count());
        tera_context.insert("failure_count", &summary.failure_count());
        tera_context.insert("successes", &successes);
        tera_context.insert("failures", &failures);
        self.tera.render("report.html", &tera_context)
    }
}
