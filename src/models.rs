use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Multipart part carrying the proof-of-payment file.
pub const PROOF_FIELD: &str = "comprobante_pago";

/// Text fields of a payment confirmation, keyed by their wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    FirstNames,
    LastNames,
    Email,
    Phone,
    University,
    Ticket,
    StudentCode,
    Major,
    OperationType,
    OperationNumber,
    NationalId,
}

impl FormField {
    /// Form order, which is also the order missing fields are reported in.
    pub const ALL: [FormField; 11] = [
        FormField::FirstNames,
        FormField::LastNames,
        FormField::Email,
        FormField::Phone,
        FormField::University,
        FormField::Ticket,
        FormField::StudentCode,
        FormField::Major,
        FormField::OperationType,
        FormField::OperationNumber,
        FormField::NationalId,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            FormField::FirstNames => "nombres",
            FormField::LastNames => "apellidos",
            FormField::Email => "correo",
            FormField::Phone => "telefono",
            FormField::University => "universidad",
            FormField::Ticket => "entrada",
            FormField::StudentCode => "codigo",
            FormField::Major => "carrera",
            FormField::OperationType => "tipo_operacion",
            FormField::OperationNumber => "numero_operacion",
            FormField::NationalId => "dni",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.wire_name() == name)
    }

    pub fn label(self) -> &'static str {
        match self {
            FormField::FirstNames => "First names",
            FormField::LastNames => "Last names",
            FormField::Email => "Email",
            FormField::Phone => "Phone",
            FormField::University => "University",
            FormField::Ticket => "Ticket",
            FormField::StudentCode => "Student code",
            FormField::Major => "Major",
            FormField::OperationType => "Operation type",
            FormField::OperationNumber => "Operation number",
            FormField::NationalId => "National ID",
        }
    }

    pub fn is_required(self) -> bool {
        self != FormField::StudentCode
    }

    /// Longest accepted value in characters; matches the `payments` column width.
    pub fn max_len(self) -> usize {
        match self {
            FormField::NationalId => 20,
            FormField::Phone
            | FormField::Ticket
            | FormField::StudentCode
            | FormField::OperationType
            | FormField::OperationNumber => 50,
            FormField::FirstNames
            | FormField::LastNames
            | FormField::Email
            | FormField::University
            | FormField::Major => 255,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentForm {
    pub first_names: String,
    pub last_names: String,
    pub email: String,
    pub phone: String,
    pub university: String,
    pub ticket: String,
    pub student_code: String,
    pub major: String,
    pub operation_type: String,
    pub operation_number: String,
    pub national_id: String,
}

impl PaymentForm {
    /// Stores a trimmed value. Later values for the same field win.
    pub fn set(&mut self, field: FormField, value: &str) {
        *self.slot_mut(field) = value.trim().to_string();
    }

    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::FirstNames => &self.first_names,
            FormField::LastNames => &self.last_names,
            FormField::Email => &self.email,
            FormField::Phone => &self.phone,
            FormField::University => &self.university,
            FormField::Ticket => &self.ticket,
            FormField::StudentCode => &self.student_code,
            FormField::Major => &self.major,
            FormField::OperationType => &self.operation_type,
            FormField::OperationNumber => &self.operation_number,
            FormField::NationalId => &self.national_id,
        }
    }

    fn slot_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::FirstNames => &mut self.first_names,
            FormField::LastNames => &mut self.last_names,
            FormField::Email => &mut self.email,
            FormField::Phone => &mut self.phone,
            FormField::University => &mut self.university,
            FormField::Ticket => &mut self.ticket,
            FormField::StudentCode => &mut self.student_code,
            FormField::Major => &mut self.major,
            FormField::OperationType => &mut self.operation_type,
            FormField::OperationNumber => &mut self.operation_number,
            FormField::NationalId => &mut self.national_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub form: PaymentForm,
}

impl From<PaymentForm> for NewPayment {
    fn from(form: PaymentForm) -> Self {
        Self { form }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i32,
    pub first_names: String,
    pub last_names: String,
    pub email: String,
    pub phone: String,
    pub university: String,
    pub ticket: String,
    pub student_code: String,
    pub major: String,
    pub operation_type: String,
    pub operation_number: String,
    pub national_id: String,
    pub registered_at: DateTime<Utc>,
}

impl Payment {
    pub fn from_new(id: i32, payment: NewPayment, registered_at: DateTime<Utc>) -> Self {
        let form = payment.form;
        Self {
            id,
            first_names: form.first_names,
            last_names: form.last_names,
            email: form.email,
            phone: form.phone,
            university: form.university,
            ticket: form.ticket,
            student_code: form.student_code,
            major: form.major,
            operation_type: form.operation_type,
            operation_number: form.operation_number,
            national_id: form.national_id,
            registered_at,
        }
    }

    /// Field values in form order, paired with their labels.
    pub fn labelled_fields(&self) -> [(&'static str, &str); 11] {
        FormField::ALL.map(|field| {
            let value = match field {
                FormField::FirstNames => self.first_names.as_str(),
                FormField::LastNames => self.last_names.as_str(),
                FormField::Email => self.email.as_str(),
                FormField::Phone => self.phone.as_str(),
                FormField::University => self.university.as_str(),
                FormField::Ticket => self.ticket.as_str(),
                FormField::StudentCode => self.student_code.as_str(),
                FormField::Major => self.major.as_str(),
                FormField::OperationType => self.operation_type.as_str(),
                FormField::OperationNumber => self.operation_number.as_str(),
                FormField::NationalId => self.national_id.as_str(),
            };
            (field.label(), value)
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiMessage {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_resolve_to_fields() {
        for field in FormField::ALL {
            assert_eq!(FormField::from_wire_name(field.wire_name()), Some(field));
        }
        assert_eq!(FormField::from_wire_name("comprobante_pago"), None);
    }

    #[test]
    fn set_trims_and_overwrites() {
        let mut form = PaymentForm::default();
        form.set(FormField::OperationNumber, "  0001  ");
        form.set(FormField::OperationNumber, " 0002\n");

        assert_eq!(form.get(FormField::OperationNumber), "0002");
    }
}
