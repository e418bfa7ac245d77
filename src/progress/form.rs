use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    /// Cleared by the user; stored as `""`.
    #[serde(rename = "")]
    Unset,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unset => "",
        }
    }
}

impl FromStr for Gender {
    type Err = FormFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "" => Ok(Gender::Unset),
            other => Err(FormFieldError::InvalidValue {
                field: "gender",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormFieldError {
    #[error("unknown form field: {0}")]
    UnknownField(String),
    #[error("invalid value {value:?} for form field {field}")]
    InvalidValue { field: &'static str, value: String },
}

macro_rules! application_form {
    ($($field:ident => $name:literal),+ $(,)?) => {
        /// The residence-permit application form, filled in piece by piece.
        ///
        /// Every field is optional. `None` means the user never touched the
        /// field; `Some(String::new())` means they cleared it.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        pub struct ApplicationFormData {
            $(pub $field: Option<String>,)+
            pub gender: Option<Gender>,
        }

        impl ApplicationFormData {
            /// Wire names of all fields, in form order.
            pub const FIELDS: &'static [&'static str] = &[$($name,)+ "gender"];

            /// Shallow merge: every field set in `patch` overwrites ours,
            /// every field absent from `patch` is left alone.
            pub fn merge(&mut self, patch: ApplicationFormData) {
                $(
                    if patch.$field.is_some() {
                        self.$field = patch.$field;
                    }
                )+
                if patch.gender.is_some() {
                    self.gender = patch.gender;
                }
            }

            /// Set one field by its wire name.
            pub fn set(
                &mut self,
                name: &str,
                value: impl Into<String>,
            ) -> Result<(), FormFieldError> {
                let value = value.into();
                match name {
                    $($name => self.$field = Some(value),)+
                    "gender" => self.gender = Some(value.parse()?),
                    other => return Err(FormFieldError::UnknownField(other.to_string())),
                }
                Ok(())
            }

            /// Read one field by its wire name. Unknown names read as `None`.
            pub fn get(&self, name: &str) -> Option<&str> {
                match name {
                    $($name => self.$field.as_deref(),)+
                    "gender" => self.gender.as_ref().map(Gender::as_str),
                    _ => None,
                }
            }

            /// Number of fields that hold a value, empty strings included.
            pub fn filled(&self) -> usize {
                let mut count = usize::from(self.gender.is_some());
                $(count += usize::from(self.$field.is_some());)+
                count
            }

            pub fn is_empty(&self) -> bool {
                self.filled() == 0
            }
        }
    };
}

application_form! {
    last_name => "lastName",
    first_name => "firstName",
    middle_name => "middleName",
    date_of_birth => "dateOfBirth",
    place_of_birth => "placeOfBirth",
    citizenship => "citizenship",
    current_address => "currentAddress",
    current_city => "currentCity",
    current_country => "currentCountry",
    russian_address => "russianAddress",
    russian_city => "russianCity",
    russian_region => "russianRegion",
    passport_number => "passportNumber",
    passport_issue_date => "passportIssueDate",
    passport_expiry_date => "passportExpiryDate",
    visa_number => "visaNumber",
    visa_issue_date => "visaIssueDate",
    entry_date => "entryDate",
    inn => "inn",
    phone_number => "phoneNumber",
    email => "email",
    occupation => "occupation",
    employer => "employer",
    rvp_reason => "rvpReason",
}
