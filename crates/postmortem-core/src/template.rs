use crate::config::TemplateConfig;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Slot replaced with the user's incident notes. Every template must have it.
pub const NOTES_SLOT: &str = "{incident_notes}";
/// Optional slot replaced with the server-formatted current date.
pub const DATE_SLOT: &str = "{date}";

// ---------------------------------------------------------------------------
// ReportFormat
// ---------------------------------------------------------------------------

/// The built-in report formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    ExecutiveSummary,
    TechnicalPostmortem,
    ExecutiveCommunication,
    VisualTimeline,
    ActionItems,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 5] = [
        ReportFormat::ExecutiveSummary,
        ReportFormat::TechnicalPostmortem,
        ReportFormat::ExecutiveCommunication,
        ReportFormat::VisualTimeline,
        ReportFormat::ActionItems,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportFormat::ExecutiveSummary => "executive_summary",
            ReportFormat::TechnicalPostmortem => "technical_postmortem",
            ReportFormat::ExecutiveCommunication => "executive_communication",
            ReportFormat::VisualTimeline => "visual_timeline",
            ReportFormat::ActionItems => "action_items",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReportFormat::ExecutiveSummary => "Executive Summary",
            ReportFormat::TechnicalPostmortem => "Technical Post-Mortem",
            ReportFormat::ExecutiveCommunication => "Executive Communication",
            ReportFormat::VisualTimeline => "Visual Timeline",
            ReportFormat::ActionItems => "Action Item Tracker",
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            ReportFormat::ExecutiveSummary => EXECUTIVE_SUMMARY,
            ReportFormat::TechnicalPostmortem => TECHNICAL_POSTMORTEM,
            ReportFormat::ExecutiveCommunication => EXECUTIVE_COMMUNICATION,
            ReportFormat::VisualTimeline => VISUAL_TIMELINE,
            ReportFormat::ActionItems => ACTION_ITEMS,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ReportFormat::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub key: String,
    pub label: String,
    pub body: String,
    pub builtin: bool,
}

impl Template {
    fn builtin(format: ReportFormat) -> Self {
        Self {
            key: format.as_str().to_string(),
            label: format.label().to_string(),
            body: format.template().to_string(),
            builtin: true,
        }
    }

    /// Build the prompt for these notes, stamped with today's date.
    pub fn render(&self, incident_notes: &str) -> String {
        fill(&self.body, incident_notes, &today())
    }

    pub fn render_with_date(&self, incident_notes: &str, date: &str) -> String {
        fill(&self.body, incident_notes, date)
    }
}

// ---------------------------------------------------------------------------
// TemplateRegistry
// ---------------------------------------------------------------------------

/// Read-only map from format key to prompt template, built once at startup.
///
/// Built-ins come first in canonical order, then custom templates from
/// config sorted by key. A custom template with a built-in key replaces
/// the built-in body in place.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
    default_key: String,
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        Self {
            templates: ReportFormat::ALL.into_iter().map(Template::builtin).collect(),
            default_key: ReportFormat::default().as_str().to_string(),
        }
    }

    /// Extend the built-ins with `custom` templates and pick `default_key`.
    pub fn with_custom(
        custom: &BTreeMap<String, TemplateConfig>,
        default_key: &str,
    ) -> Result<Self> {
        let mut registry = Self::builtin();

        for (key, cfg) in custom {
            if !cfg.body.contains(NOTES_SLOT) {
                return Err(CoreError::MissingNotesSlot(key.clone()));
            }
            let label = cfg.label.clone().unwrap_or_else(|| key.clone());
            match registry.templates.iter_mut().find(|t| &t.key == key) {
                Some(existing) => {
                    existing.label = label;
                    existing.body = cfg.body.clone();
                    existing.builtin = false;
                }
                None => registry.templates.push(Template {
                    key: key.clone(),
                    label,
                    body: cfg.body.clone(),
                    builtin: false,
                }),
            }
        }

        if registry.lookup(default_key).is_none() {
            return Err(CoreError::UnknownFormat(default_key.to_string()));
        }
        registry.default_key = default_key.to_string();
        Ok(registry)
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    /// Exact lookup with no fallback.
    pub fn lookup(&self, key: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.key == key)
    }

    /// Resolve a requested key, falling back to the default template when
    /// the key is missing or unknown.
    pub fn get(&self, key: Option<&str>) -> &Template {
        key.and_then(|k| self.lookup(k))
            .or_else(|| self.lookup(&self.default_key))
            .unwrap_or(&self.templates[0])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Slot filling
// ---------------------------------------------------------------------------

/// Substitute the notes and date slots in one left-to-right pass.
///
/// Slot markers inside the substituted text are left alone, so notes that
/// happen to contain `{date}` come through verbatim. Any other `{` is
/// copied unchanged.
pub fn fill(template: &str, incident_notes: &str, date: &str) -> String {
    let mut out = String::with_capacity(template.len() + incident_notes.len());
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(NOTES_SLOT) {
            out.push_str(incident_notes);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(DATE_SLOT) {
            out.push_str(date);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Current local date as used in the `{date}` slot, e.g. `October 19, 2026`.
pub fn today() -> String {
    chrono::Local::now().format("%B %d, %Y").to_string()
}

// ---------------------------------------------------------------------------
// Built-in template bodies
// ---------------------------------------------------------------------------

const EXECUTIVE_SUMMARY: &str = r#"
You are an experienced SRE technical writer. Read the incident notes below and write a one-page Executive Summary.

INCIDENT NOTES:
{incident_notes}

The Executive Summary must contain:
1. An INCIDENT SUMMARY header listing Incident ID, Date, Duration, Severity and Status
2. Impact: what was affected and at what scale
3. Root Cause: a single clear sentence
4. Resolution: two or three bullet points describing what was done
5. Follow-up Actions: the key next steps
6. Business Impact: a short assessment

Stay within one page. Use plain, non-technical language suitable for leadership.
Return clean markdown.
"#;

const TECHNICAL_POSTMORTEM: &str = r#"
You are an experienced SRE technical writer. Read the incident notes below and write a complete Technical Post-Mortem.

INCIDENT NOTES:
{incident_notes}

Use the following structure:

## Incident Overview
- Date, time, duration and severity
- Affected service
- Impact statement

## Timeline
A markdown table with Time | Event columns tracing the incident from first signal to resolution

## Root Cause Analysis
### What Happened
A clear technical explanation

### Why It Happened
1. Immediate cause
2. Contributing factors

### Why It Wasn't Caught
What prevented earlier detection

## Impact Assessment
### Technical Impact
- Metrics and numbers
- Systems affected

### Business Impact
- Customer impact
- Revenue impact
- Reputation impact

## Resolution
### Immediate Actions Taken
A numbered list

### Verification
How the fix was confirmed

## Action Items
A markdown table: Priority | Action | Owner | Due Date | Status

## Lessons Learned
### What Went Well
Mark each item with ✅

### What Could Be Improved
Mark each item with ❌

### Recommendations
Short, medium and long term

## Supporting Data
Relevant metrics, queries or technical details

Write professional markdown suitable for engineering documentation.
"#;

const EXECUTIVE_COMMUNICATION: &str = r#"
You are an expert in executive communication. Read the incident notes below and draft an email to leadership.

INCIDENT NOTES:
{incident_notes}

Draft the email with:

**Subject:** [RESOLVED] Short description - Date

**To:** Engineering Leadership, Product Team
**From:** SRE Team
**Date:** {date}

### Summary
Two or three sentences in plain English

### What Happened
A non-technical explanation

### Customer Impact
- Duration
- Severity in business terms
- Scale
- Escalations

### Resolution
How and when it was fixed, without jargon

### Prevention
What is being done to stop it happening again

### Questions?
Contact details

Keep the tone calm and professional. Avoid technical jargon. Focus on customer impact and prevention.
"#;

const VISUAL_TIMELINE: &str = r#"
You are an expert at drawing visual timelines. Read the incident notes below and produce an ASCII art timeline.

INCIDENT NOTES:
{incident_notes}

Follow this layout:

```
Incident Timeline - [Short Title]
━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

[Time] │ [emoji] [Event]
       │
       │ [note about elapsed time when there is a gap]
       │
[Time] │ [emoji] [Event]
[Time] │ [emoji] [Event]
       │
       └─────────────────────────────────────────────

🔴 Detection: X min
🔍 Diagnosis: X min
🛠️  Mitigation: X min
━━━━━━━━━━━━━━━━━
Total: X minutes
```

Choose emojis from this set:
⚙️  deployment or setup
🔴 issue detected
🚨 alert fired
📊 metrics or monitoring
🔍 investigation
💡 root cause found
🛠️  mitigation
⚡ quick fix
📈 recovery
✅ resolved
📝 follow-up

Keep it easy to scan.
"#;

const ACTION_ITEMS: &str = r#"
You are an expert at organising follow-up work. Read the incident notes below and build an action item tracker.

INCIDENT NOTES:
{incident_notes}

Use these sections:

### Immediate Actions (Complete)
- [x] Action - @owner - timestamp

### Short-term (< 1 week)
- [ ] Action - @owner - Due: date

### Medium-term (1-4 weeks)
- [ ] Action - @owner - Due: date

### Long-term (Future)
- [ ] Action

Extract every action item stated or implied in the notes.
Group them by timeframe and priority.
Assign owners from context using the @name form.
Give realistic due dates based on priority.
Use markdown checkboxes.
"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
