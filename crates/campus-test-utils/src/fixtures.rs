use crate::clock::fixture_epoch;
use campus_protocol::{Course, CourseStatus, CourseType, Student, StudentStatus};

/// Course "Art 101" in person, active, capacity 20.
pub fn course(id: &str, institution_id: &str) -> Course {
    CourseBuilder::new(id, institution_id).build()
}

/// Active student with full attendance.
pub fn student(id: &str, institution_id: &str) -> Student {
    StudentBuilder::new(id, institution_id).build()
}

#[derive(Debug, Clone)]
pub struct CourseBuilder {
    course: Course,
}

impl CourseBuilder {
    pub fn new(id: &str, institution_id: &str) -> Self {
        Self {
            course: Course {
                id: id.to_string(),
                institution_id: institution_id.to_string(),
                title: "Art 101".to_string(),
                description: String::new(),
                course_type: CourseType::InPerson,
                status: CourseStatus::Active,
                teacher_id: None,
                aula_id: None,
                capacity: 20,
                enrolled: 0,
                created_at: fixture_epoch(),
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.course.title = title.to_string();
        self
    }

    pub fn course_type(mut self, course_type: CourseType) -> Self {
        self.course.course_type = course_type;
        self
    }

    pub fn teacher(mut self, teacher_id: &str) -> Self {
        self.course.teacher_id = Some(teacher_id.to_string());
        self
    }

    pub fn build(self) -> Course {
        self.course
    }
}

#[derive(Debug, Clone)]
pub struct StudentBuilder {
    student: Student,
}

impl StudentBuilder {
    pub fn new(id: &str, institution_id: &str) -> Self {
        Self {
            student: Student {
                id: id.to_string(),
                institution_id: institution_id.to_string(),
                name: format!("Student {id}"),
                email: None,
                status: StudentStatus::Active,
                attendance_rate: 100.0,
                course_ids: Vec::new(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.student.name = name.to_string();
        self
    }

    pub fn attendance_rate(mut self, rate: f64) -> Self {
        self.student.attendance_rate = rate;
        self
    }

    pub fn build(self) -> Student {
        self.student
    }
}
