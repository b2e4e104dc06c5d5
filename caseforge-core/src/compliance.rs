//! Read-only dictionary of compliance standards.
//!
//! Requirements and generated test cases are tagged by matching their
//! text against each standard's keywords.

/// One compliance standard and the keywords that indicate it
#[derive(Debug, Clone)]
pub struct ComplianceStandard {
    /// Short id used in compliance_refs, e.g. "HIPAA"
    pub id: String,
    pub name: String,
    pub keywords: Vec<String>,
}

impl ComplianceStandard {
    pub fn new(id: &str, name: &str, keywords: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Static standard id → name/keywords mapping
#[derive(Debug, Clone)]
pub struct ComplianceDictionary {
    standards: Vec<ComplianceStandard>,
}

impl ComplianceDictionary {
    pub fn new(standards: Vec<ComplianceStandard>) -> Self {
        Self { standards }
    }

    /// Standards a healthcare requirements document is expected to cite
    pub fn healthcare_default() -> Self {
        Self::new(vec![
            ComplianceStandard::new(
                "HIPAA",
                "Health Insurance Portability and Accountability Act",
                &["hipaa", "protected health information", "phi", "patient privacy"],
            ),
            ComplianceStandard::new(
                "FDA 21 CFR Part 11",
                "FDA Electronic Records and Signatures",
                &["21 cfr part 11", "electronic signature", "electronic record", "audit trail"],
            ),
            ComplianceStandard::new(
                "FDA 21 CFR Part 820",
                "FDA Quality System Regulation",
                &["21 cfr part 820", "quality system regulation", "design control"],
            ),
            ComplianceStandard::new(
                "GDPR",
                "General Data Protection Regulation",
                &["gdpr", "data protection", "right to erasure", "data subject"],
            ),
            ComplianceStandard::new(
                "ISO 13485",
                "Medical Devices Quality Management",
                &["iso 13485", "medical device quality"],
            ),
            ComplianceStandard::new(
                "IEC 62304",
                "Medical Device Software Lifecycle",
                &["iec 62304", "software lifecycle", "software safety class"],
            ),
            ComplianceStandard::new(
                "ISO 27001",
                "Information Security Management",
                &["iso 27001", "information security", "encryption", "access control"],
            ),
        ])
    }

    pub fn standards(&self) -> &[ComplianceStandard] {
        &self.standards
    }

    /// Ids of standards whose keywords (or id/name) occur in `text`,
    /// in dictionary order, without duplicates
    pub fn match_text(&self, text: &str) -> Vec<String> {
        let haystack = text.to_lowercase();
        self.standards
            .iter()
            .filter(|standard| {
                standard
                    .keywords
                    .iter()
                    .any(|keyword| haystack.contains(&keyword.to_lowercase()))
                    || haystack.contains(&standard.id.to_lowercase())
            })
            .map(|standard| standard.id.clone())
            .collect()
    }

    /// Whether `reference` names a known standard (by id or name,
    /// case-insensitive)
    pub fn is_known(&self, reference: &str) -> bool {
        self.standards.iter().any(|standard| {
            standard.id.eq_ignore_ascii_case(reference) || standard.name.eq_ignore_ascii_case(reference)
        })
    }
}
